//! Scripted stand-ins for the operator, the command runner and the remote service.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;

use crate::{
    Choice, CommandRunner, DeleteOutcome, Evidence, ExecutionResult, InvestigateRequest,
    Operator, RemoteError, RemoteService, ResponseEnvelope, Tone,
};

pub(crate) fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

pub(crate) struct CountingRunner {
    stdout: String,
    exit_code: i32,
    calls: Cell<usize>,
    seen: RefCell<Vec<Vec<String>>>,
}

impl CountingRunner {
    pub(crate) fn returning(stdout: &str, exit_code: i32) -> Self {
        Self {
            stdout: stdout.to_string(),
            exit_code,
            calls: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    pub(crate) fn seen(&self) -> Vec<Vec<String>> {
        self.seen.borrow().clone()
    }
}

impl CommandRunner for CountingRunner {
    fn execute(&self, argv: &[String]) -> ExecutionResult {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(argv.to_vec());
        ExecutionResult {
            stdout: self.stdout.clone(),
            stderr: String::new(),
            exit_code: self.exit_code,
            truncated: false,
        }
    }
}

#[derive(Default)]
pub(crate) struct ScriptedOperator {
    answers: VecDeque<Choice>,
    issues: VecDeque<String>,
    prompts: usize,
    said: Vec<(Tone, String)>,
}

impl ScriptedOperator {
    pub(crate) fn new(answers: &[Choice]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn with_issues(mut self, issues: &[&str]) -> Self {
        self.issues = issues.iter().map(|s| s.to_string()).collect();
        self
    }

    pub(crate) fn prompts(&self) -> usize {
        self.prompts
    }

    pub(crate) fn said(&self) -> &[(Tone, String)] {
        &self.said
    }

    pub(crate) fn said_containing(&self, needle: &str) -> bool {
        self.said.iter().any(|(_, text)| text.contains(needle))
    }
}

impl Operator for ScriptedOperator {
    fn say(&mut self, tone: Tone, text: &str) {
        self.said.push((tone, text.to_string()));
    }

    fn choose(&mut self, _prompt: &str, choices: &[Choice]) -> io::Result<Choice> {
        self.prompts += 1;
        let answer = self
            .answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer"))?;
        assert!(choices.contains(&answer), "{answer:?} not offered in {choices:?}");
        Ok(answer)
    }

    fn read_issue(&mut self) -> io::Result<Option<String>> {
        Ok(self.issues.pop_front())
    }
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    responses: RefCell<VecDeque<Result<ResponseEnvelope, RemoteError>>>,
    deletes: RefCell<VecDeque<Result<DeleteOutcome, RemoteError>>>,
    investigations: RefCell<Vec<InvestigateRequest>>,
    evidence: RefCell<Vec<Evidence>>,
    deleted: RefCell<Vec<String>>,
}

impl FakeRemote {
    pub(crate) fn new(responses: Vec<Result<ResponseEnvelope, RemoteError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            ..Self::default()
        }
    }

    pub(crate) fn with_deletes(self, outcomes: Vec<Result<DeleteOutcome, RemoteError>>) -> Self {
        *self.deletes.borrow_mut() = outcomes.into();
        self
    }

    pub(crate) fn investigations(&self) -> Vec<InvestigateRequest> {
        self.investigations.borrow().clone()
    }

    pub(crate) fn evidence(&self) -> Vec<Evidence> {
        self.evidence.borrow().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    fn next(&self) -> Result<ResponseEnvelope, RemoteError> {
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::schema("fake remote ran out of responses")))
    }
}

impl RemoteService for FakeRemote {
    fn investigate(&self, request: &InvestigateRequest) -> Result<ResponseEnvelope, RemoteError> {
        self.investigations.borrow_mut().push(request.clone());
        self.next()
    }

    fn evidence(&self, evidence: &Evidence) -> Result<ResponseEnvelope, RemoteError> {
        self.evidence.borrow_mut().push(evidence.clone());
        self.next()
    }

    fn delete(&self, conversation_id: &str) -> Result<DeleteOutcome, RemoteError> {
        self.deleted.borrow_mut().push(conversation_id.to_string());
        self.deletes
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(DeleteOutcome::Deleted))
    }

    fn delete_url(&self, conversation_id: &str) -> String {
        format!("http://fake/delete/{conversation_id}")
    }
}

pub(crate) fn command_response(id: &str, command: &[&str]) -> Result<ResponseEnvelope, RemoteError> {
    Ok(ResponseEnvelope {
        conversation_id: Some(id.to_string()),
        command: Some(argv(command)),
        ..ResponseEnvelope::default()
    })
}

pub(crate) fn completed_response(id: &str, text: &str) -> Result<ResponseEnvelope, RemoteError> {
    Ok(ResponseEnvelope {
        conversation_id: Some(id.to_string()),
        text: Some(text.to_string()),
        completed: true,
        ..ResponseEnvelope::default()
    })
}
