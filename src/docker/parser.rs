use serde::Deserialize;
use tracing::warn;

/// One line of `docker ps --format '{{json .}}'`, as far as reconciliation
/// cares about it. Exists only within a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContainer {
    pub engine_id: String,
    pub name: String,
    pub state: String,
    pub image: String,
    pub ports: String,
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    // Older engines only report the human-readable status.
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Ports", default)]
    ports: String,
}

impl From<PsLine> for RemoteContainer {
    fn from(line: PsLine) -> Self {
        // Linked containers list several comma separated names; the first is canonical.
        let name = line
            .names
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let state = if line.state.is_empty() {
            line.status
        } else {
            line.state
        };
        Self {
            engine_id: line.id.trim().to_string(),
            name,
            state,
            image: line.image,
            ports: line.ports,
        }
    }
}

/// Decodes `docker ps` output line by line. A line that is not a JSON object
/// with the expected fields is logged and skipped; the rest still parse.
pub fn parse_ps_output(raw: &str) -> impl Iterator<Item = RemoteContainer> + '_ {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<PsLine>(line.trim()) {
            Ok(parsed) => Some(parsed.into()),
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed docker ps line.");
                None
            }
        })
}
