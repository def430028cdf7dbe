//! Replay of recorded navigation logs.
//!
//! A log is JSON Lines, one event per line:
//!
//! ```text
//! {"type": "tab_opened", "tab": "main"}
//! {"type": "navigated", "tab": "main", "url": "https://...", "observations": [{...}]}
//! {"type": "tab_opened", "tab": "popup-1", "opener": "main"}
//! {"type": "tab_closed", "tab": "popup-1"}
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::{NavigationFanIn, TabHandle};
use crate::domain::models::{PageView, TabId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    TabOpened {
        tab: TabId,
        #[serde(default)]
        opener: Option<TabId>,
    },
    Navigated {
        tab: TabId,
        url: String,
        #[serde(default)]
        observations: Vec<Value>,
    },
    TabClosed {
        tab: TabId,
    },
}

/// Parse a JSON Lines event log. Blank lines are skipped.
pub fn parse_event_log(text: &str) -> Result<Vec<ReplayEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", i + 1))
        })
        .collect()
}

pub fn load_event_log(path: impl AsRef<Path>) -> Result<Vec<ReplayEvent>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    parse_event_log(&text).with_context(|| format!("Invalid event log {}", path.display()))
}

/// Feed events through the fan-in in log order and wait until all of them
/// have been applied.
pub async fn replay(fan_in: &NavigationFanIn, events: Vec<ReplayEvent>) -> Result<()> {
    let mut tabs: HashMap<TabId, TabHandle> = HashMap::new();

    for event in events {
        match event {
            ReplayEvent::TabOpened { tab, opener } => {
                let handle = fan_in.attach_tab(tab.clone(), opener).await?;
                tabs.insert(tab, handle);
            }
            ReplayEvent::Navigated {
                tab,
                url,
                observations,
            } => {
                let handle = tab_handle(fan_in, &mut tabs, tab.clone()).await?;
                handle
                    .on_navigate(PageView {
                        tab,
                        url,
                        payload: Value::Array(observations),
                    })
                    .await?;
            }
            ReplayEvent::TabClosed { tab } => {
                tab_handle(fan_in, &mut tabs, tab).await?.close().await?;
            }
        }
    }

    fan_in.flush().await?;
    Ok(())
}

async fn tab_handle(
    fan_in: &NavigationFanIn,
    tabs: &mut HashMap<TabId, TabHandle>,
    tab: TabId,
) -> Result<TabHandle> {
    if let Some(handle) = tabs.get(&tab) {
        return Ok(handle.clone());
    }
    let handle = fan_in.attach_tab(tab.clone(), None).await?;
    tabs.insert(tab, handle.clone());
    Ok(handle)
}
