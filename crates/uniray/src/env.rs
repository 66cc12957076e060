use std::env;
use std::sync::OnceLock;

static UNIRAY_BACKEND: OnceLock<String> = OnceLock::new();

/// Default backend name, read once from `UNIRAY_BACKEND`.
pub(crate) fn default_backend_name() -> &'static str {
    UNIRAY_BACKEND.get_or_init(|| match env::var("UNIRAY_BACKEND") {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => "ref-cpu".to_string(),
    })
}
