//! User agent handling for HTTP requests.

pub const USER_AGENT: &str = concat!(
    "menor-preco/",
    env!("CARGO_PKG_VERSION"),
    " (price research; menorpreco.notaparana.pr.gov.br)"
);

/// Browser user agent for services that reject unknown clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0";

/// Resolve user agent from config value.
/// - None => default user agent
/// - "browser" => a desktop Firefox user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("browser") => BROWSER_USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}
