use crate::platforms::AccessibilityProvider;
use crate::{AutomationError, Point, Size, UiElement};
use std::time::Duration;
use tracing::debug;

const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Enumerates UI elements of an application's front window. Backed by the
/// System Events accessibility tree on macOS; other platforms are
/// unsupported.
pub struct ScriptAccessibility;

impl ScriptAccessibility {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScriptAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

fn dump_script(app: &str) -> String {
    let app = app.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"
tell application "System Events"
    tell process "{app}"
        set elementList to ""
        repeat with elem in (buttons of window 1)
            try
                set pos to position of elem
                set sz to size of elem
                set elementList to elementList & "button|" & (name of elem) & "|" & (item 1 of pos) & "," & (item 2 of pos) & "|" & (item 1 of sz) & "," & (item 2 of sz) & "\n"
            end try
        end repeat
        repeat with elem in (checkboxes of window 1)
            try
                set pos to position of elem
                set sz to size of elem
                set elementList to elementList & "checkbox|" & (name of elem) & "|" & (item 1 of pos) & "," & (item 2 of pos) & "|" & (item 1 of sz) & "," & (item 2 of sz) & "|" & (value of elem) & "\n"
            end try
        end repeat
        repeat with elem in (text fields of window 1)
            try
                set pos to position of elem
                set sz to size of elem
                set elementList to elementList & "textfield|" & (name of elem) & "|" & (item 1 of pos) & "," & (item 2 of pos) & "|" & (item 1 of sz) & "," & (item 2 of sz) & "|" & (value of elem) & "\n"
            end try
        end repeat
        repeat with elem in (menu buttons of window 1)
            try
                set pos to position of elem
                set sz to size of elem
                set elementList to elementList & "menubutton|" & (name of elem) & "|" & (item 1 of pos) & "," & (item 2 of pos) & "|" & (item 1 of sz) & "," & (item 2 of sz) & "\n"
            end try
        end repeat
    end tell
end tell
return elementList
"#
    )
}

fn parse_pair(text: &str, line: &str) -> Result<(i32, i32), AutomationError> {
    let malformed = || AutomationError::ParseError(format!("Malformed element entry: {line}"));
    let (a, b) = text.split_once(',').ok_or_else(malformed)?;
    let x = a.trim().parse::<i32>().map_err(|_| malformed())?;
    let y = b.trim().parse::<i32>().map_err(|_| malformed())?;
    Ok((x, y))
}

/// Parses the `type|name|x,y|w,h[|extra]` dump emitted by the osascript
/// query. Lines with fewer than four fields are skipped.
pub(crate) fn parse_dump(output: &str) -> Result<Vec<UiElement>, AutomationError> {
    let mut elements = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            continue;
        }
        let (x, y) = parse_pair(parts[2], line)?;
        let (w, h) = parse_pair(parts[3], line)?;
        let extra = parts.get(4).map(|s| s.trim());

        let kind = parts[0].to_string();
        let checked = match (kind.as_str(), extra) {
            ("checkbox", Some(v)) => Some(v == "1"),
            _ => None,
        };
        let value = match (kind.as_str(), extra) {
            ("textfield", Some(v)) => Some(v.to_string()),
            _ => None,
        };
        elements.push(UiElement {
            kind,
            name: parts[1].trim().to_string(),
            position: Point { x, y },
            size: Size { w, h },
            checked,
            value,
        });
    }
    Ok(elements)
}

#[async_trait::async_trait]
impl AccessibilityProvider for ScriptAccessibility {
    async fn elements(&self, app: &str) -> Result<Vec<UiElement>, AutomationError> {
        if std::env::consts::OS != "macos" {
            return Err(AutomationError::Unsupported(format!(
                "accessibility enumeration on {}",
                std::env::consts::OS
            )));
        }

        let script = dump_script(app);
        let command = tokio::process::Command::new("osascript")
            .args(["-e", &script])
            .output();
        let output = tokio::time::timeout(QUERY_TIMEOUT, command)
            .await
            .map_err(|_| AutomationError::Timeout("accessibility query".to_string()))?
            .map_err(|e| {
                AutomationError::ExternalFailure(format!("Failed to run osascript: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutomationError::ExternalFailure(format!(
                "Accessibility query failed: {}",
                stderr.trim()
            )));
        }

        let dump = String::from_utf8_lossy(&output.stdout);
        let elements = parse_dump(&dump)?;
        debug!(app, count = elements.len(), "accessibility elements");
        Ok(elements)
    }
}
