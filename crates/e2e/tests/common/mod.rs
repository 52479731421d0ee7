//! In-memory page used by the flow tests
//!
//! Elements are plain selector strings. Events (`goto:<url>`, `click:<selector>`,
//! `fill:<selector>`) can be wired to reactions that mutate the page, either
//! immediately or after a delay on the tokio clock.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tokio::time::{sleep, Instant};

use authflow_e2e::page::{LoadState, Page};
use authflow_e2e::{E2eError, E2eResult};

pub const BASE_URL: &str = "http://app.test";
const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub struct PageState {
    pub url: String,
    pub visible: HashSet<String>,
    pub disabled: HashSet<String>,
    pub values: HashMap<String, String>,
    pub texts: HashMap<String, String>,
    pub lists: HashMap<String, Vec<String>>,
    pub validation: HashMap<String, String>,
    pub events: Vec<String>,
}

impl PageState {
    pub fn show(&mut self, selector: &str) {
        self.visible.insert(selector.to_string());
    }

    pub fn hide(&mut self, selector: &str) {
        self.visible.remove(selector);
    }

    pub fn show_text(&mut self, selector: &str, text: &str) {
        self.show(selector);
        self.texts.insert(selector.to_string(), text.to_string());
    }

    pub fn set_disabled(&mut self, selector: &str, disabled: bool) {
        if disabled {
            self.disabled.insert(selector.to_string());
        } else {
            self.disabled.remove(selector);
        }
    }

    pub fn navigate(&mut self, path: &str) {
        self.url = format!("{}{}", BASE_URL, path);
    }

    pub fn value(&self, selector: &str) -> &str {
        self.values.get(selector).map(String::as_str).unwrap_or("")
    }
}

type Reaction = Arc<dyn Fn(&mut PageState) + Send + Sync>;

#[derive(Default)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
    reactions: Mutex<HashMap<String, Vec<(Duration, Reaction)>>>,
}

impl FakePage {
    pub fn new() -> Self {
        let page = Self::default();
        page.state.lock().navigate("/");
        page
    }

    /// Mutate the page right now
    pub fn with_state(&self, f: impl FnOnce(&mut PageState)) {
        f(&mut *self.state.lock());
    }

    /// Run `f` every time `event` happens, `delay` later
    pub fn on(&self, event: &str, delay: Duration, f: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.reactions
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((delay, Arc::new(f)));
    }

    pub fn count(&self, event: &str) -> usize {
        self.state.lock().events.iter().filter(|e| *e == event).count()
    }

    pub fn url_now(&self) -> String {
        self.state.lock().url.clone()
    }

    fn fire(&self, event: String) {
        self.state.lock().events.push(event.clone());
        let reactions = self.reactions.lock().get(&event).cloned().unwrap_or_default();

        for (delay, reaction) in reactions {
            if delay.is_zero() {
                reaction(&mut *self.state.lock());
            } else {
                let state = self.state.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    reaction(&mut *state.lock());
                });
            }
        }
    }

    async fn poll(&self, what: &str, timeout: Duration, check: impl Fn(&PageState) -> bool) -> E2eResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if check(&*self.state.lock()) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::Timeout(what.to_string()));
            }
            sleep(POLL).await;
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.state.lock().navigate(url);
        self.fire(format!("goto:{}", url));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.state.lock().values.insert(selector.to_string(), value.to_string());
        self.fire(format!("fill:{}", selector));
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        let clickable = {
            let state = self.state.lock();
            state.visible.contains(selector) && !state.disabled.contains(selector)
        };
        if !clickable {
            return Err(E2eError::Playwright(format!("cannot click {}", selector)));
        }
        self.fire(format!("click:{}", selector));
        Ok(())
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.poll(selector, timeout, |s| s.visible.contains(selector)).await
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.state.lock().visible.contains(selector))
    }

    async fn is_disabled(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.state.lock().disabled.contains(selector))
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        Ok(self.state.lock().texts.get(selector).cloned())
    }

    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>> {
        Ok(self.state.lock().lists.get(selector).cloned().unwrap_or_default())
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        Ok(self.state.lock().value(selector).to_string())
    }

    async fn validation_message(&self, selector: &str) -> E2eResult<String> {
        Ok(self.state.lock().validation.get(selector).cloned().unwrap_or_default())
    }

    async fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> E2eResult<()> {
        self.poll(pattern.as_str(), timeout, |s| pattern.is_match(&s.url)).await
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.url_now())
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> E2eResult<()> {
        Ok(())
    }
}
