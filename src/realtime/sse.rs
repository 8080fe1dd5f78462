//! Server-sent event framing and the record mirror fed by the database stream.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One dispatched event. `data` is the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder; chunks may split lines and events anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

/// Body of `put` and `patch` events.
#[derive(Debug, Deserialize)]
pub struct PathData {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// Local copy of the watched record, rebuilt from `put` and `patch` events.
#[derive(Debug, Clone, Default)]
pub struct RecordMirror {
    value: Value,
}

impl RecordMirror {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replace the node at `path` with `data`.
    pub fn put(&mut self, path: &str, data: Value) {
        *self.node_mut(path) = data;
    }

    /// Merge the children of `data` into the node at `path`; `null` children delete.
    pub fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            return;
        };
        let node = self.node_mut(path);
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            for (key, child) in children {
                if child.is_null() {
                    map.remove(&key);
                } else {
                    map.insert(key, child);
                }
            }
        }
    }

    fn node_mut(&mut self, path: &str) -> &mut Value {
        let mut node = &mut self.value;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
                other => other,
            };
        }
        node
    }
}
