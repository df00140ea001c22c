use std::fmt::Write;

use crate::proxy::ProxySite;

/// Render an nginx `server` block for the site.
#[must_use]
pub fn render(site: &ProxySite) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Managed by trebuchet for '{}'", site.name);
    out.push_str("server {\n");
    let _ = writeln!(out, "    listen {};", site.listen);
    let _ = writeln!(out, "    server_name {};", site.server_name);
    out.push('\n');
    out.push_str("    location / {\n");
    let _ = writeln!(out, "        proxy_pass {};", site.upstream());
    out.push_str("        proxy_http_version 1.1;\n");
    for (name, value) in &site.headers {
        let _ = writeln!(out, "        proxy_set_header {name} {value};");
    }
    out.push_str("    }\n");
    out.push_str("}\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_site() {
        let site = ProxySite::new("shop", 3000);

        let result = render(&site);

        assert_eq!(
            result,
            "\
# Managed by trebuchet for 'shop'
server {
    listen 80;
    server_name _;

    location / {
        proxy_pass http://127.0.0.1:3000;
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
}
"
        );
    }

    #[test]
    fn literal_server_name() {
        let site = ProxySite::new("shop", 3000).server_name("203.0.113.7");

        let result = render(&site);

        assert!(result.contains("server_name 203.0.113.7;"));
    }
}
