//! Kubeconfig rewriting for in-container use.
//!
//! The frontend hands us a kubeconfig that points at the host's loopback
//! address, which is unreachable from inside the extension container. The
//! server URL is rewritten to `host.docker.internal`, and TLS verification is
//! skipped for the rewritten clusters since that hostname is not in the API
//! server certificate's SANs.

const HOST_GATEWAY: &str = "host.docker.internal";
const SKIP_TLS_KEY: &str = "insecure-skip-tls-verify: true";

pub fn patch_for_container(kubeconfig: &str) -> String {
    let mut out = String::with_capacity(kubeconfig.len());
    let mut changed = false;

    // Only `server:` lines are rewritten; a loopback URL anywhere else in
    // the document (proxy-url, comments) is left alone.
    for line in kubeconfig.lines() {
        let trimmed = line.trim_start();
        let loopback = if trimmed.starts_with("server: https://127.0.0.1:") {
            Some("https://127.0.0.1:")
        } else if trimmed.starts_with("server: https://localhost:") {
            Some("https://localhost:")
        } else {
            None
        };

        let Some(loopback) = loopback else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        changed = true;
        let rewritten = line.replacen(loopback, &format!("https://{HOST_GATEWAY}:"), 1);
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        out.push_str(&rewritten);
        out.push('\n');
        out.push_str(&indent);
        out.push_str(SKIP_TLS_KEY);
        out.push('\n');
    }

    if !changed {
        return kubeconfig.to_string();
    }
    out
}
