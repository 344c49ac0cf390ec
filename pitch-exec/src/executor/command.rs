//! Stack-based interpreter that drives the steps of one run.
//!
//! Every step compiles to
//! `[SetStep, Loop([Conditional([SetPhase(request), PrepareRequest, SendRequest,
//! SetPhase(response), InitializeResponses, ProcessResponse])])]`.
//! Loops and conditionals are expanded lazily when they reach the front of the
//! stack, so loop items are resolved against the context as it is at that moment.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Phase;
use crate::executor::ExecutionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    SetStep(usize),
    BindItem(Value),
    SetPhase(Phase),
    /// Renders the step, runs request plugins and prepares the request.
    PrepareRequest,
    SendRequest,
    InitializeResponses,
    /// Runs response plugins and records the response for looping steps.
    ProcessResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Instruction),
    Conditional(Vec<Command>),
    Loop(Vec<Command>),
}

pub fn compile_step(index: usize) -> Vec<Command> {
    let body = vec![
        Command::Run(Instruction::SetPhase(Phase::Request)),
        Command::Run(Instruction::PrepareRequest),
        Command::Run(Instruction::SendRequest),
        Command::Run(Instruction::SetPhase(Phase::Response)),
        Command::Run(Instruction::InitializeResponses),
        Command::Run(Instruction::ProcessResponse),
    ];
    vec![
        Command::Run(Instruction::SetStep(index)),
        Command::Loop(vec![Command::Conditional(body)]),
    ]
}

pub fn compile_plan(steps: usize) -> Vec<Command> {
    (0..steps).flat_map(compile_step).collect()
}

/// Pending commands; the front runs next.
#[derive(Debug, Default)]
pub struct CommandStack {
    pending: VecDeque<Command>,
}

impl CommandStack {
    pub fn new(plan: Vec<Command>) -> Self {
        Self { pending: plan.into() }
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.pending.pop_front()
    }

    /// Puts `commands` in front of everything pending, keeping their order.
    pub fn push_front(&mut self, commands: Vec<Command>) {
        for command in commands.into_iter().rev() {
            self.pending.push_front(command);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Executes instructions and resolves control flow for the current step.
#[async_trait]
pub trait CommandInvoker: Send {
    async fn invoke(&mut self, instruction: Instruction) -> Result<(), ExecutionError>;

    async fn evaluate_conditional(&mut self) -> Result<bool, ExecutionError>;

    /// `None` when the current step does not loop.
    async fn evaluate_loop(&mut self) -> Result<Option<Vec<Value>>, ExecutionError>;
}

pub struct Scheduler {
    stack: CommandStack,
}

impl Scheduler {
    pub fn new(plan: Vec<Command>) -> Self {
        Self {
            stack: CommandStack::new(plan),
        }
    }

    /// Processes the stack until it is empty or an instruction fails.
    pub async fn run<I>(mut self, invoker: &mut I) -> Result<(), ExecutionError>
    where
        I: CommandInvoker + ?Sized,
    {
        while let Some(command) = self.stack.pop() {
            match command {
                Command::Run(instruction) => invoker.invoke(instruction).await?,
                Command::Conditional(body) => {
                    if invoker.evaluate_conditional().await? {
                        self.stack.push_front(body);
                    }
                }
                Command::Loop(body) => match invoker.evaluate_loop().await? {
                    None => self.stack.push_front(body),
                    Some(items) => {
                        let mut expanded = Vec::with_capacity(items.len() * (body.len() + 1));
                        for item in items {
                            expanded.push(Command::Run(Instruction::BindItem(item)));
                            expanded.extend(body.iter().cloned());
                        }
                        self.stack.push_front(expanded);
                    }
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        trace: Vec<Instruction>,
        items: Option<Vec<Value>>,
        condition: bool,
        conditions_checked: usize,
    }

    #[async_trait]
    impl CommandInvoker for Recorder {
        async fn invoke(&mut self, instruction: Instruction) -> Result<(), ExecutionError> {
            self.trace.push(instruction);
            Ok(())
        }

        async fn evaluate_conditional(&mut self) -> Result<bool, ExecutionError> {
            self.conditions_checked += 1;
            Ok(self.condition)
        }

        async fn evaluate_loop(&mut self) -> Result<Option<Vec<Value>>, ExecutionError> {
            Ok(self.items.clone())
        }
    }

    fn binds(trace: &[Instruction]) -> Vec<Value> {
        trace
            .iter()
            .filter_map(|i| match i {
                Instruction::BindItem(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn loop_binds_each_item_before_its_body() {
        let mut recorder = Recorder {
            items: Some(vec![json!("a"), json!("b"), json!("c")]),
            condition: true,
            ..Recorder::default()
        };
        Scheduler::new(compile_plan(1)).run(&mut recorder).await.unwrap();

        assert_eq!(binds(&recorder.trace), vec![json!("a"), json!("b"), json!("c")]);
        let sends = recorder.trace.iter().filter(|i| **i == Instruction::SendRequest).count();
        assert_eq!(sends, 3);
        assert_eq!(recorder.conditions_checked, 3);
        assert_eq!(recorder.trace[1], Instruction::BindItem(json!("a")));
        assert_eq!(recorder.trace[2], Instruction::SetPhase(Phase::Request));
    }

    #[tokio::test]
    async fn false_conditional_discards_the_body_only() {
        let mut recorder = Recorder::default();
        Scheduler::new(compile_plan(2)).run(&mut recorder).await.unwrap();
        assert_eq!(
            recorder.trace,
            vec![Instruction::SetStep(0), Instruction::SetStep(1)]
        );
    }

    #[tokio::test]
    async fn empty_loop_runs_nothing_and_no_loop_runs_once() {
        let mut recorder = Recorder {
            items: Some(Vec::new()),
            condition: true,
            ..Recorder::default()
        };
        Scheduler::new(compile_plan(1)).run(&mut recorder).await.unwrap();
        assert_eq!(recorder.trace, vec![Instruction::SetStep(0)]);

        let mut recorder = Recorder {
            condition: true,
            ..Recorder::default()
        };
        Scheduler::new(compile_plan(1)).run(&mut recorder).await.unwrap();
        assert_eq!(recorder.trace.len(), 7);
        assert!(binds(&recorder.trace).is_empty());
    }

    #[test]
    fn push_front_keeps_order_ahead_of_pending() {
        let mut stack = CommandStack::new(vec![Command::Run(Instruction::SendRequest)]);
        stack.push_front(vec![
            Command::Run(Instruction::SetStep(1)),
            Command::Run(Instruction::SetStep(2)),
        ]);
        assert_eq!(stack.pop(), Some(Command::Run(Instruction::SetStep(1))));
        assert_eq!(stack.pop(), Some(Command::Run(Instruction::SetStep(2))));
        assert_eq!(stack.pop(), Some(Command::Run(Instruction::SendRequest)));
        assert!(stack.is_empty());
    }
}
