//! Política interactiva: muestra el step actual y lee la elección del
//! operador de una entrada de texto (stdin en el binario).

use std::io::{self, BufRead, Write};

use pilot_core::{Choice, CommandOutcome, CommandPolicy, NodeKind, StepId, StepPrompt, StepTree};

pub struct ConsolePolicy<R, W> {
    input: R,
    output: W,
}

impl ConsolePolicy<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn render<C>(&mut self, prompt: &StepPrompt<C>) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "== {} ({})", prompt.title, prompt.key)?;
        if let Some(description) = &prompt.description {
            writeln!(self.output, "   {description}")?;
        }
        let risk = prompt.risk.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string());
        writeln!(self.output, "   status: {}  risk: {risk}", prompt.status)?;
        if let Some(message) = &prompt.message {
            writeln!(self.output, "   note: {message}")?;
        }
        for (i, command) in prompt.commands.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, command.description())?;
        }
        write!(self.output, "choice [1-{}, q to stop]: ", prompt.commands.len())?;
        self.output.flush()
    }

    fn read_choice<C>(&mut self, prompt: &StepPrompt<C>) -> io::Result<Choice> {
        loop {
            self.render(prompt)?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Choice::Stop("input closed".to_string()));
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("q") {
                return Ok(Choice::Stop("stopped by operator".to_string()));
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=prompt.commands.len()).contains(&n) => return Ok(Choice::Command(n - 1)),
                _ => writeln!(self.output, "'{answer}' is not a valid choice")?,
            }
        }
    }
}

impl<C, R: BufRead, W: Write> CommandPolicy<C> for ConsolePolicy<R, W> {
    fn choose(&mut self, prompt: &StepPrompt<C>) -> Choice {
        self.read_choice(prompt)
            .unwrap_or_else(|e| Choice::Stop(format!("console error: {e}")))
    }

    fn observe(&mut self, step: &str, outcome: &CommandOutcome) {
        let line = match outcome {
            CommandOutcome::Applied(res) => match &res.message {
                Some(message) => format!("{step}: {} ({message})", res.status),
                None => format!("{step}: {}", res.status),
            },
            CommandOutcome::Skipped => format!("{step}: skipped"),
            CommandOutcome::SkipRefused => format!("{step}: this step cannot be skipped"),
            CommandOutcome::ActionCompleted { message, .. } => {
                format!("{step}: {}", message.as_deref().unwrap_or("action done"))
            }
            CommandOutcome::ActionFailed { message } => format!("{step}: action failed: {message}"),
            CommandOutcome::Canceled => format!("{step}: canceled"),
        };
        let _ = writeln!(self.output, "-> {line}");
    }
}

/// Árbol indentado con el estado efectivo de cada nodo.
pub fn render_tree<C: Send + Sync>(tree: &StepTree<C>) -> String {
    let mut out = String::new();
    render_node(tree, tree.root(), 0, &mut out);
    out
}

fn render_node<C: Send + Sync>(tree: &StepTree<C>, id: StepId, depth: usize, out: &mut String) {
    let Ok(node) = tree.node(id) else { return };
    let status = tree.status(id).map(|s| s.to_string()).unwrap_or_default();
    let marker = match node.kind() {
        NodeKind::Leaf(_) => "-",
        NodeKind::Group { .. } => "+",
    };
    out.push_str(&format!("{}{marker} {} [{status}]\n", "  ".repeat(depth), node.title()));
    for child in node.children() {
        render_node(tree, *child, depth + 1, out);
    }
}
