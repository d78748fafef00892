use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Workstation lane. The set is fixed; display order is declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Queue {
    Assigned,
    Active,
    Done,
    Blocked,
}

impl Queue {
    pub const ALL: [Queue; 4] = [Queue::Assigned, Queue::Active, Queue::Done, Queue::Blocked];

    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::Assigned => "Assigned",
            Queue::Active => "Active",
            Queue::Done => "Done",
            Queue::Blocked => "Blocked",
        }
    }

    /// Parse a queue name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Queue> {
        let name = name.trim();
        Queue::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserialize an optional queue, mapping unrecognised names to `None`.
///
/// Device records come from imports and the test lab, so the queue
/// field can hold anything. An unknown lane behaves like no lane.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<Queue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Queue::parse))
}
