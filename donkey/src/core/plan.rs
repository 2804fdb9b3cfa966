//! Expansion of a group's `run` lines into concrete shell invocations.

use std::fmt;

/// Interpreter used when neither the group nor `.config` names one.
pub const DEFAULT_INTERPRETER: &str = "bash";

/// Flag passed to the interpreter ahead of the command body.
pub const COMMAND_FLAG: &str = "-c";

/// One child process invocation: `interpreter -c body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub interpreter: String,
    pub body: String,
}

impl ShellCommand {
    pub fn new(interpreter: &str, body: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            body: body.into(),
        }
    }

    /// Arguments following the interpreter binary.
    pub fn args(&self) -> [&str; 2] {
        [COMMAND_FLAG, self.body.as_str()]
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.interpreter, COMMAND_FLAG, self.body)
    }
}

/// The ordered invocations a group will spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub commands: Vec<ShellCommand>,
}

impl ExecutionPlan {
    /// Build the plan for `run`.
    ///
    /// In script mode the lines become one newline-joined script and extra
    /// arguments are rejected (even an empty string). Otherwise each line is
    /// its own invocation with non-empty `args` appended after a space.
    pub fn build(
        run: &[String],
        args: Option<&str>,
        interpreter: &str,
        script_mode: bool,
    ) -> Result<Self, String> {
        let bodies = if script_mode {
            if args.is_some() {
                return Err("\"args\" are invalid for a command in \"script\" mode".to_string());
            }
            vec![run.join("\n")]
        } else {
            match args {
                Some(args) if !args.is_empty() => {
                    run.iter().map(|line| format!("{line} {args}")).collect()
                }
                _ => run.to_vec(),
            }
        };

        Ok(Self {
            commands: bodies
                .into_iter()
                .map(|body| ShellCommand::new(interpreter, body))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
