//! Topic routing for proxied object-change notifications.
//!
//! Watches are consulted in ascending `seq` order and the first pattern that
//! matches the object url wins. Later watches with overlapping patterns are
//! never looked at once an earlier one matched.

use regex::Regex;
use tracing::debug;

use crate::watch::{ValidationError, WatchConfig, compile_pattern};

/// A compiled, ordered routing table built from watch configurations.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: Vec<Route>,
}

#[derive(Debug, Clone)]
struct Route {
    seq: i64,
    pattern: Regex,
    topic: String,
}

impl TopicRouter {
    /// Compile all watch patterns. Fails on the first pattern that does not
    /// compile, since a silently skipped rule would change routing.
    pub fn from_watches(watches: &[WatchConfig]) -> Result<Self, ValidationError> {
        let mut ordered: Vec<&WatchConfig> = watches.iter().collect();
        ordered.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));

        let routes = ordered
            .into_iter()
            .map(|w| {
                Ok(Route {
                    seq: w.seq,
                    pattern: compile_pattern(&w.pattern)?,
                    topic: w.topic.clone(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self { routes })
    }

    /// Destination topic of the first matching route, if any.
    pub fn resolve(&self, url: &str) -> Option<&str> {
        let hit = self.routes.iter().find(|r| r.pattern.is_match(url));
        match hit {
            Some(route) => {
                debug!(%url, seq = route.seq, topic = %route.topic, "topic resolved");
                Some(route.topic.as_str())
            }
            None => {
                debug!(%url, "no watch matches url");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
