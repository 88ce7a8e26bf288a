use std::io::{self, BufRead, Write};

use colored::{ColoredString, Colorize};

/// What a line of operator-facing text is, which decides how it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tone {
    Command,
    Completed,
    Explanation,
    Output,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Choice {
    Yes,
    No,
    Exit,
}

impl Choice {
    pub(crate) fn key(self) -> char {
        match self {
            Choice::Yes => 'y',
            Choice::No => 'n',
            Choice::Exit => 'x',
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Choice::Yes => "Yes",
            Choice::No => "No",
            Choice::Exit => "Exit",
        }
    }
}

/// The human at the keyboard.
pub(crate) trait Operator {
    fn say(&mut self, tone: Tone, text: &str);

    /// Ask until one of `choices` is picked.
    fn choose(&mut self, prompt: &str, choices: &[Choice]) -> io::Result<Choice>;

    /// Next issue to investigate, or `None` once input is exhausted.
    fn read_issue(&mut self) -> io::Result<Option<String>>;
}

pub(crate) fn render_choices(choices: &[Choice]) -> String {
    choices
        .iter()
        .map(|c| format!("{} ({})", c.label(), c.key()))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn paint(tone: Tone, text: &str) -> ColoredString {
    match tone {
        Tone::Command | Tone::Output => text.yellow(),
        Tone::Completed => text.green(),
        Tone::Explanation => text.white(),
        Tone::Prompt => text.cyan(),
    }
}

/// Line-oriented terminal operator over any reader/writer pair.
pub(crate) struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub(crate) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn say(&mut self, tone: Tone, text: &str) {
        let _ = writeln!(self.output, "{}", paint(tone, text));
        let _ = self.output.flush();
    }

    fn choose(&mut self, prompt: &str, choices: &[Choice]) -> io::Result<Choice> {
        let options = render_choices(choices);
        loop {
            write!(self.output, "{}", paint(Tone::Prompt, &format!("{prompt} [{options}]: ")))?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed while waiting for an answer",
                ));
            };
            let key = line.trim().chars().next().map(|c| c.to_ascii_lowercase());
            if let Some(choice) = choices.iter().copied().find(|c| Some(c.key()) == key) {
                return Ok(choice);
            }
        }
    }

    fn read_issue(&mut self) -> io::Result<Option<String>> {
        writeln!(self.output, "{}", paint(Tone::Prompt, "What would you like me to investigate?"))?;
        write!(self.output, "{}", paint(Tone::Prompt, "Issue: "))?;
        self.output.flush()?;
        Ok(self.read_line()?.map(|line| line.trim().to_string()))
    }
}
