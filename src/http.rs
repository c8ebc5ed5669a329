//! Shared ureq helpers

use std::time::Duration;

/// Agent with the crate's standard timeouts.
pub fn agent(read_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(read_timeout)
        .build()
}

/// Map a ureq error into anyhow, preserving HTTP status bodies.
pub fn read_error(error: ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            anyhow::anyhow!("HTTP {}: {}", code, body)
        }
        other => anyhow::Error::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_builds() {
        let _agent = agent(Duration::from_secs(30));
    }
}
