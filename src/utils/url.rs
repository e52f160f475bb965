//! Endpoint addressing for the answering service.

use reqwest::Url;

/// Resolve a service endpoint below `base`.
///
/// `base` may carry a prefix path (`http://host/api/`); each entry of `path`
/// becomes exactly one percent-encoded segment after it, so a tool id with a
/// `/` or a space cannot escape its slot.
pub fn endpoint_url(base: &str, path: &[&str]) -> Result<Url, String> {
    let mut url =
        Url::parse(base.trim()).map_err(|err| format!("invalid service URL {base:?}: {err}"))?;
    let prefix: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| format!("service URL {base:?} cannot address endpoints"))?
        .clear()
        .extend(&prefix)
        .extend(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_endpoints_resolve_below_the_host() {
        let base = "http://localhost:4090";
        assert_eq!(
            endpoint_url(base, &["health"]).unwrap().as_str(),
            "http://localhost:4090/health"
        );
        assert_eq!(
            endpoint_url(base, &["chat", "simple"]).unwrap().as_str(),
            "http://localhost:4090/chat/simple"
        );
        assert_eq!(
            endpoint_url(base, &["tools", "categories"]).unwrap().as_str(),
            "http://localhost:4090/tools/categories"
        );
    }

    #[test]
    fn prefix_paths_and_trailing_slashes_are_kept_once() {
        assert_eq!(
            endpoint_url("https://svc.example/agent/", &["chat"]).unwrap().as_str(),
            "https://svc.example/agent/chat"
        );
        assert_eq!(
            endpoint_url("https://svc.example/agent", &["models"]).unwrap().as_str(),
            "https://svc.example/agent/models"
        );
        assert_eq!(
            endpoint_url("http://localhost:4090//", &["models"]).unwrap().as_str(),
            "http://localhost:4090/models"
        );
        assert_eq!(
            endpoint_url(" http://localhost:4090/?debug=1 ", &["health"])
                .unwrap()
                .as_str(),
            "http://localhost:4090/health"
        );
    }

    #[test]
    fn tool_names_stay_one_segment() {
        assert_eq!(
            endpoint_url("http://localhost:4090", &["tools", "web search/v2", "execute"])
                .unwrap()
                .as_str(),
            "http://localhost:4090/tools/web%20search%2Fv2/execute"
        );
        assert_eq!(
            endpoint_url("http://localhost:4090", &["tools", "calculator", "execute"])
                .unwrap()
                .path(),
            "/tools/calculator/execute"
        );
    }

    #[test]
    fn unusable_bases_are_reported() {
        assert!(endpoint_url("localhost:4090", &["health"]).is_err());
        assert!(endpoint_url("", &["health"]).is_err());
        assert!(endpoint_url("mailto:ops@example.com", &["health"]).is_err());
    }
}
