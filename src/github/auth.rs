use tracing::debug;

const TOKEN_VARS: [&str; 3] = ["GITHUB_PAT", "GITHUB_TOKEN", "GH_TOKEN"];

/// Resolve a GitHub token through `lookup`, normally the process environment.
///
/// Checked in order: `GITHUB_PAT`, `GITHUB_TOKEN`, `GH_TOKEN`. A missing token
/// is not an error: requests go out unauthenticated and GitHub applies the
/// anonymous rate limit.
pub fn token_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for var in TOKEN_VARS {
        if let Some(token) = lookup(var)
            && !token.trim().is_empty()
        {
            debug!(var = var, "Token resolved from environment");
            return Some(token.trim().to_string());
        }
    }
    debug!("No GitHub token configured, using unauthenticated requests");
    None
}
