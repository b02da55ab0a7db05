use crate::{shared::Identifier, store::StateQuery};

use super::error::ApiError;

/// Root of every read-surface path.
pub const BASE_PATH: &str = "/diatomite";

/// Maps a request path to the state query it addresses.
///
/// The shape of the path is checked before any identifier in it: a path outside [`BASE_PATH`] or
/// naming an unknown sub-resource is [`ApiError::Forbidden`], a malformed identifier in an
/// otherwise valid path is [`ApiError::InvalidIdentifier`]. A single trailing `/` is ignored.
pub fn parse_route(path: &str) -> Result<StateQuery, ApiError> {
    let forbidden = || ApiError::Forbidden {
        path: path.to_string(),
    };

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let rest = trimmed.strip_prefix(BASE_PATH).ok_or_else(forbidden)?;
    let rest = rest.strip_prefix('/').ok_or_else(forbidden)?;

    let segments: Vec<&str> = rest.split('/').collect();

    let id = |segment: &str| {
        Identifier::new(segment).map_err(|source| ApiError::InvalidIdentifier {
            path: path.to_string(),
            source,
        })
    };

    let query = match segments[..] {
        ["sites"] => StateQuery::Sites,
        ["sites", site] => StateQuery::Site { site: id(site)? },
        ["sites", site, "probes"] => StateQuery::Probes { site: id(site)? },
        ["sites", site, "probes", probe] => StateQuery::Probe {
            site: id(site)?,
            probe: id(probe)?,
        },
        ["sites", site, "probes", probe, "RadioSources"] => StateQuery::Sources {
            site: id(site)?,
            probe: id(probe)?,
        },
        ["sites", site, "probes", probe, "RadioSources", source] => StateQuery::Source {
            site: id(site)?,
            probe: id(probe)?,
            source: id(source)?,
        },
        ["sites", site, "probes", probe, "RadioSources", source, "listeners"] => {
            StateQuery::Listeners {
                site: id(site)?,
                probe: id(probe)?,
                source: id(source)?,
            }
        }
        ["sites", site, "probes", probe, "RadioSources", source, "listeners", listener] => {
            StateQuery::Listener {
                site: id(site)?,
                probe: id(probe)?,
                source: id(source)?,
                listener: id(listener)?,
            }
        }
        [
            "sites",
            site,
            "probes",
            probe,
            "RadioSources",
            source,
            "listeners",
            listener,
            "current_signal_state",
        ] => StateQuery::CurrentSignalState {
            site: id(site)?,
            probe: id(probe)?,
            source: id(source)?,
            listener: id(listener)?,
        },
        _ => return Err(forbidden()),
    };

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn test_parse_route_levels() {
        assert_eq!(parse_route("/diatomite/sites").unwrap(), StateQuery::Sites);
        assert_eq!(parse_route("/diatomite/sites/").unwrap(), StateQuery::Sites);
        assert_eq!(
            parse_route("/diatomite/sites/S1/probes").unwrap(),
            StateQuery::Probes { site: id("s1") }
        );
        assert_eq!(
            parse_route("/diatomite/sites/s1/probes/p1/RadioSources/r0").unwrap(),
            StateQuery::Source {
                site: id("s1"),
                probe: id("p1"),
                source: id("r0"),
            }
        );
        assert_eq!(
            parse_route(
                "/diatomite/sites/s1/probes/p1/RadioSources/r0/listeners/l0/current_signal_state"
            )
            .unwrap(),
            StateQuery::CurrentSignalState {
                site: id("s1"),
                probe: id("p1"),
                source: id("r0"),
                listener: id("l0"),
            }
        );
    }

    #[test]
    fn test_parse_route_forbidden_paths() {
        for path in [
            "/",
            "/diatomite",
            "/diatomite/",
            "/diatomitex/sites",
            "/other/sites",
            "/diatomite/probes",
            "/diatomite/sites/s1/radiosources",
            "/diatomite/sites/s1/probes/p1/RadioSources/r0/listeners/l0/history",
        ] {
            assert!(
                matches!(parse_route(path), Err(ApiError::Forbidden { .. })),
                "{path}"
            );
        }
    }

    #[test]
    fn test_parse_route_invalid_identifier() {
        let err = parse_route("/diatomite/sites/s1/probes/p%201").unwrap_err();
        assert!(matches!(err, ApiError::InvalidIdentifier { .. }));
        assert_eq!(err.path(), "/diatomite/sites/s1/probes/p%201");

        assert!(matches!(
            parse_route("/diatomite/sites//probes"),
            Err(ApiError::InvalidIdentifier { .. })
        ));
    }
}
