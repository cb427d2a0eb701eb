//! services/api/src/adapters/browser/page.rs
//!
//! `ChatPage` over a CDP tab. DOM work happens in small injected scripts; the
//! chosen input element is tagged with a data attribute so later steps can find
//! it again without repeating the visibility checks.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::cdp::CdpPage;
use super::extractor::{AutomationError, ChatPage, ElementText};

const INPUT_MARKER: &str = "data-genfuze-input";

fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    Value::String(value.to_string()).to_string()
}

fn find_input_script(selectors: &[&str]) -> String {
    let selectors = Value::from(selectors.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    format!(
        r#"(() => {{
  document.querySelectorAll('[{marker}]').forEach(el => el.removeAttribute('{marker}'));
  for (const sel of {selectors}) {{
    for (const el of document.querySelectorAll(sel)) {{
      const rect = el.getBoundingClientRect();
      const style = window.getComputedStyle(el);
      const visible = rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
      const enabled = !el.disabled && !el.readOnly && el.getAttribute('aria-disabled') !== 'true';
      if (visible && enabled) {{
        el.setAttribute('{marker}', '1');
        return sel;
      }}
    }}
  }}
  return null;
}})()"#,
        marker = INPUT_MARKER,
        selectors = selectors,
    )
}

fn with_input_script(body: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector('[{marker}]');
  if (!el) throw new Error('chat input is no longer on the page');
  {body}
  return true;
}})()"#,
        marker = INPUT_MARKER,
        body = body,
    )
}

fn last_element_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  const els = document.querySelectorAll({selector});
  if (!els.length) return null;
  const el = els[els.length - 1];
  return {{
    text: el.innerText || el.textContent || '',
    children: Array.from(el.children).map(c => c.innerText || c.textContent || ''),
  }};
}})()"#,
        selector = js_string(selector),
    )
}

fn enter_key(kind: &str) -> Value {
    json!({
        "type": kind,
        "key": "Enter",
        "code": "Enter",
        "windowsVirtualKeyCode": 13,
        "nativeVirtualKeyCode": 13,
    })
}

#[async_trait]
impl ChatPage for CdpPage {
    async fn open(&self, url: &str) -> Result<(), AutomationError> {
        self.navigate(url).await?;
        Ok(())
    }

    async fn find_input(&self, selectors: &[&str]) -> Result<Option<String>, AutomationError> {
        let found = self.evaluate(&find_input_script(selectors)).await?;
        Ok(found.as_str().map(str::to_string))
    }

    async fn clear_input(&self) -> Result<(), AutomationError> {
        self.evaluate(&with_input_script(
            r#"el.focus();
  if ('value' in el) { el.value = ''; } else { el.textContent = ''; }
  el.dispatchEvent(new Event('input', { bubbles: true }));"#,
        ))
        .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.insert_text(text).await?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), AutomationError> {
        let mut down = enter_key("keyDown");
        down["text"] = json!("\r");
        self.key_events(&[down, enter_key("keyUp")]).await?;
        Ok(())
    }

    async fn press_return(&self) -> Result<(), AutomationError> {
        let char_event = json!({ "type": "char", "text": "\r", "unmodifiedText": "\r" });
        self.key_events(&[enter_key("rawKeyDown"), char_event, enter_key("keyUp")])
            .await?;
        Ok(())
    }

    async fn dispatch_enter_event(&self) -> Result<(), AutomationError> {
        self.evaluate(&with_input_script(
            r#"el.focus();
  const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true };
  el.dispatchEvent(new KeyboardEvent('keydown', init));
  el.dispatchEvent(new KeyboardEvent('keypress', init));
  el.dispatchEvent(new KeyboardEvent('keyup', init));"#,
        ))
        .await?;
        Ok(())
    }

    async fn last_element_text(&self, selector: &str) -> Result<Option<ElementText>, AutomationError> {
        let value = self.evaluate(&last_element_script(selector)).await?;
        if value.is_null() {
            return Ok(None);
        }
        let text = value["text"].as_str().unwrap_or_default().to_string();
        let children = value["children"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(ElementText { text, children }))
    }

    async fn body_text(&self) -> Result<String, AutomationError> {
        let value = self
            .evaluate("document.body ? document.body.innerText : ''")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_embedded_as_literals() {
        let script = last_element_script("[data-testid='bot-message']");
        assert!(script.contains(r#"querySelectorAll("[data-testid='bot-message']")"#));

        let script = find_input_script(&["textarea", "div[contenteditable=\"true\"]"]);
        assert!(script.contains(r#"["textarea","div[contenteditable=\"true\"]"]"#));
        assert!(script.contains(INPUT_MARKER));
    }

    #[test]
    fn enter_events_carry_key_codes() {
        let down = enter_key("keyDown");
        assert_eq!(down["type"], "keyDown");
        assert_eq!(down["windowsVirtualKeyCode"], 13);
    }
}
