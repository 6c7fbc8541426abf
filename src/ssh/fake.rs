//! Scripted in-memory host used by tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::exec::{CommandOutput, Remote};
use crate::error::{DeployError, DeployResult};
use crate::shell;

type Handler = Box<dyn Fn(&str) -> Option<CommandOutput> + Send + Sync>;

pub struct FakeRemote {
    host: String,
    rules: Vec<(String, Mutex<VecDeque<CommandOutput>>)>,
    handler: Option<Handler>,
    log: Mutex<Vec<String>>,
    secrets: Vec<String>,
    unreachable: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            host: "203.0.113.10".to_string(),
            rules: Vec::new(),
            handler: None,
            log: Mutex::new(Vec::new()),
            secrets: Vec::new(),
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new()
        }
    }

    /// Answer commands containing `pattern`. Repeated calls queue answers;
    /// the last one sticks.
    pub fn on(mut self, pattern: &str, output: CommandOutput) -> Self {
        match self.rules.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, queue)) => queue.get_mut().unwrap().push_back(output),
            None => self
                .rules
                .push((pattern.to_string(), Mutex::new(VecDeque::from([output])))),
        }
        self
    }

    /// Redact `secret` the way a session with a masked secret does.
    pub fn masking(mut self, secret: &str) -> Self {
        self.secrets.push(secret.to_string());
        self
    }

    /// Stateful answers, consulted before the pattern rules.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Option<CommandOutput> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }

    /// Index of the first command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(pattern))
    }

    fn respond(&self, cmd: &str) -> CommandOutput {
        if let Some(out) = self.handler.as_ref().and_then(|h| h(cmd)) {
            return out;
        }

        for (pattern, queue) in &self.rules {
            if cmd.contains(pattern.as_str()) {
                let mut queue = queue.lock().unwrap();
                return if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
            }
        }

        CommandOutput::ok("")
    }
}

#[async_trait]
impl Remote for FakeRemote {
    fn host(&self) -> &str {
        &self.host
    }

    fn redact(&self, text: &str) -> String {
        shell::redact(text, &self.secrets)
    }

    async fn run(&self, cmd: &str) -> DeployResult<CommandOutput> {
        if self.unreachable {
            return Err(DeployError::transport(&self.host, "Connection refused"));
        }
        self.log.lock().unwrap().push(cmd.to_string());
        Ok(self.respond(cmd))
    }
}
