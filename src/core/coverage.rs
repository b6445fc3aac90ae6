use serde::{Deserialize, Serialize};

/// How a remote path relates to the watched roots of one (account, workspace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Watched,
    UnderWatched,
    NotWatched,
}

const SEPARATOR: char = '/';

fn is_descendant(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some(rest) if !rest.is_empty() => {
            root.ends_with(SEPARATOR) || rest.starts_with(SEPARATOR)
        }
        _ => false,
    }
}

/// An exact match wins over any ancestor, whatever order the roots come in.
/// Empty roots are ignored; the workspace root is `/`.
pub fn resolve_watch_state<I, S>(path: &str, watched: I) -> WatchState
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = WatchState::NotWatched;
    for root in watched {
        let root = root.as_ref();
        if root.is_empty() {
            continue;
        }
        if root == path {
            return WatchState::Watched;
        }
        if is_descendant(path, root) {
            state = WatchState::UnderWatched;
        }
    }
    state
}
