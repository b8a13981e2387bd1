//! Structural clicking through the macOS accessibility layer.
//!
//! Drives System Events via `osascript` to click a named UI element of a
//! named application window. On other platforms this adapter reports
//! "not activated" for every call; sessions there should simply not wire a
//! structural clicker.

use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::executor::traits::StructuralClicker;

pub struct OsaScriptClicker;

#[cfg(target_os = "macos")]
mod mac {
    use super::*;

    fn escape(s: &str) -> String {
        s.replace('\\', "\\\\").replace('"', "\\\"")
    }

    /// Builds the System Events click script. Searching `entire contents`
    /// keeps it tolerant of nesting; `first UI element whose ...` makes
    /// ambiguous matches deterministic on the script side.
    pub fn build_script(app: &str, element: &str, window: Option<&str>) -> String {
        let app = escape(app);
        let element = escape(element);
        let scope = match window {
            Some(w) => format!("window \"{}\"", escape(w)),
            None => "front window".to_string(),
        };
        format!(
            "tell application \"System Events\" to tell process \"{app}\"\n\
             set theTarget to first UI element of entire contents of {scope} \
             whose name is \"{element}\" or title is \"{element}\"\n\
             click theTarget\n\
             end tell"
        )
    }

    pub async fn click(app: &str, element: &str, window: Option<&str>) -> bool {
        let script = build_script(app, element, window);
        let output = tokio::process::Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                tracing::debug!(app, element, "structural click confirmed");
                true
            }
            Ok(out) => {
                tracing::debug!(
                    app,
                    element,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "structural click not confirmed"
                );
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "osascript unavailable");
                false
            }
        }
    }
}

#[async_trait]
impl StructuralClicker for OsaScriptClicker {
    #[cfg(target_os = "macos")]
    async fn click(&self, app: &str, element: &str, window: Option<&str>) -> PilotResult<bool> {
        Ok(mac::click(app, element, window).await)
    }

    #[cfg(not(target_os = "macos"))]
    async fn click(&self, app: &str, element: &str, _window: Option<&str>) -> PilotResult<bool> {
        tracing::debug!(app, element, "structural clicking unsupported on this platform");
        Ok(false)
    }
}

#[cfg(all(test, target_os = "macos"))]
mod tests {
    use super::mac::build_script;

    #[test]
    fn script_escapes_quotes_and_scopes_window() {
        let script = build_script("My \"App\"", "Run", Some("Main"));
        assert!(script.contains("process \"My \\\"App\\\"\""));
        assert!(script.contains("window \"Main\""));

        let script = build_script("App", "Run", None);
        assert!(script.contains("front window"));
    }
}
