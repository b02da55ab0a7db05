//! Logger initialisation and hierarchy-scoped log context.
//!
//! Log lines follow an `EVENT_NAME key=value` register, prefixed with the [`LogContext`] of the
//! component that emits them so that a listener's activity can be followed through every hop.

use std::fmt;

use crate::shared::Identifier;

/// Installs `env_logger` with an `Info` default level and millisecond timestamps.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is harmless.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Position of a component within the site → probe → source → listener hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    site: Option<Identifier>,
    probe: Option<Identifier>,
    source: Option<Identifier>,
    listener: Option<Identifier>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(&self, site: &Identifier) -> Self {
        Self {
            site: Some(site.clone()),
            ..self.clone()
        }
    }

    pub fn with_probe(&self, probe: &Identifier) -> Self {
        Self {
            probe: Some(probe.clone()),
            ..self.clone()
        }
    }

    pub fn with_source(&self, source: &Identifier) -> Self {
        Self {
            source: Some(source.clone()),
            ..self.clone()
        }
    }

    pub fn with_listener(&self, listener: &Identifier) -> Self {
        Self {
            listener: Some(listener.clone()),
            ..self.clone()
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            ("site", &self.site),
            ("probe", &self.probe),
            ("source", &self.source),
            ("listener", &self.listener),
        ];

        let mut first = true;
        for (key, value) in parts {
            let Some(value) = value else {
                continue;
            };
            if !first {
                write!(f, " ")?;
            }
            write!(f, "[{key}={value}]")?;
            first = false;
        }

        if first {
            write!(f, "[diatomite]")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new();
        assert_eq!(format!("{ctx}"), "[diatomite]");

        let ctx = ctx.with_site(&id("s1")).with_probe(&id("p1"));
        assert_eq!(format!("{ctx}"), "[site=s1] [probe=p1]");

        let ctx = ctx.with_source(&id("R0")).with_listener(&id("l0"));
        assert_eq!(
            format!("{ctx}"),
            "[site=s1] [probe=p1] [source=r0] [listener=l0]"
        );
    }

    #[test]
    fn test_log_context_skips_missing_levels() {
        let ctx = LogContext::new().with_source(&id("r0"));
        assert_eq!(format!("{ctx}"), "[source=r0]");
    }
}
