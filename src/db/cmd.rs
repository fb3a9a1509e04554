use super::sim::Simulator;
use crate::bus::SimBus;
use chumsky::prelude::{any, choice, end, just};
use chumsky::{Parser, text};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use thiserror::Error;

//===========================================================================//

type PError<'a> = chumsky::extra::Err<chumsky::error::Rich<'a, char>>;

struct CommandInfo {
    name: &'static str,
    usage: &'static str,
    description: &'static str,
}

const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "help",
        usage: "help [CMD]",
        description: "Display information about all supported commands",
    },
    CommandInfo {
        name: "c",
        usage: "c",
        description: "Continue the execution of the program",
    },
    CommandInfo { name: "q", usage: "q", description: "Exit the simulator" },
    CommandInfo {
        name: "si",
        usage: "si [N]",
        description: "Step N instructions (default 1)",
    },
    CommandInfo {
        name: "info",
        usage: "info r|w",
        description: "Print program state (r: registers, w: watchpoints)",
    },
    CommandInfo {
        name: "x",
        usage: "x N EXPR",
        description: "Scan N 4-byte words starting at memory address EXPR",
    },
    CommandInfo {
        name: "p",
        usage: "p EXPR",
        description: "Evaluate expression EXPR",
    },
    CommandInfo {
        name: "w",
        usage: "w EXPR",
        description: "Pause execution when the value of EXPR changes",
    },
    CommandInfo {
        name: "d",
        usage: "d N",
        description: "Delete watchpoint number N",
    },
    CommandInfo {
        name: "test",
        usage: "test FILE",
        description: "Check the expression evaluator against a file of \
                      `RESULT EXPR` lines",
    },
];

fn command_info(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS.iter().find(|info| info.name == name)
}

//===========================================================================//

/// What the `info` command should print.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InfoTarget {
    /// The register file.
    Registers,
    /// The active watchpoints.
    Watchpoints,
}

/// A parsed debugger command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandAst {
    /// Describes one command, or all of them.
    Help(Option<String>),
    /// Runs until the program halts.
    Continue,
    /// Ends the debugging session.
    Quit,
    /// Executes the given number of instructions.
    Step(i64),
    /// Prints machine state.
    Info(InfoTarget),
    /// Prints memory words starting at an address.
    Examine {
        /// The number of 4-byte words to print.
        count: i64,
        /// The expression giving the starting address.
        expr: String,
    },
    /// Evaluates and prints an expression.
    Print(String),
    /// Adds a watchpoint.
    Watch(String),
    /// Removes a watchpoint.
    Delete(usize),
    /// Checks the expression evaluator against a file of expected results.
    Test(PathBuf),
}

/// An error from parsing a debugger command line.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CommandError {
    /// The command name isn't recognized.
    #[error("Unknown command '{0}'")]
    Unknown(String),
    /// The command's arguments are malformed.
    #[error("Usage: {usage}")]
    Usage {
        /// The usage synopsis of the command.
        usage: &'static str,
    },
}

fn line_parser<'a>()
-> impl Parser<'a, &'a str, Option<(&'a str, &'a str)>, PError<'a>> {
    let word = any()
        .filter(|chr: &char| !chr.is_whitespace())
        .repeated()
        .at_least(1)
        .to_slice();
    let rest = any().repeated().to_slice().map(|rest: &'a str| rest.trim());
    text::whitespace()
        .ignore_then(word.then_ignore(text::whitespace()).then(rest).or_not())
        .then_ignore(end())
}

fn signed<'a>() -> impl Parser<'a, &'a str, i64, PError<'a>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|digits: &'a str, span| {
            digits
                .parse::<i64>()
                .map_err(|error| chumsky::error::Rich::custom(span, error))
        })
}

fn unsigned<'a>() -> impl Parser<'a, &'a str, usize, PError<'a>> + Clone {
    text::int(10).try_map(|digits: &'a str, span| {
        digits
            .parse::<usize>()
            .map_err(|error| chumsky::error::Rich::custom(span, error))
    })
}

fn nonempty<'a>() -> impl Parser<'a, &'a str, String, PError<'a>> + Clone {
    any().repeated().at_least(1).to_slice().map(str::to_string)
}

/// A line of an expression test file: the expected result, then the
/// expression.
fn test_case<'a>() -> impl Parser<'a, &'a str, (u32, String), PError<'a>> {
    text::int(10)
        .try_map(|digits: &'a str, span| {
            digits
                .parse::<u32>()
                .map_err(|error| chumsky::error::Rich::custom(span, error))
        })
        .then_ignore(text::inline_whitespace().at_least(1))
        .then(nonempty())
}

fn args_parser<'a>(
    name: &str,
) -> Option<chumsky::Boxed<'a, 'a, &'a str, CommandAst, PError<'a>>> {
    let parser = match name {
        "help" => any()
            .filter(|chr: &char| !chr.is_whitespace())
            .repeated()
            .at_least(1)
            .to_slice()
            .map(str::to_string)
            .or_not()
            .map(CommandAst::Help)
            .boxed(),
        "c" => end().to(CommandAst::Continue).boxed(),
        "q" => end().to(CommandAst::Quit).boxed(),
        "si" => signed()
            .or_not()
            .map(|count| CommandAst::Step(count.unwrap_or(1)))
            .boxed(),
        "info" => choice((
            just('r').to(InfoTarget::Registers),
            just('w').to(InfoTarget::Watchpoints),
        ))
        .map(CommandAst::Info)
        .boxed(),
        "x" => signed()
            .then_ignore(text::inline_whitespace().at_least(1))
            .then(nonempty())
            .map(|(count, expr)| CommandAst::Examine { count, expr })
            .boxed(),
        "p" => nonempty().map(CommandAst::Print).boxed(),
        "w" => nonempty().map(CommandAst::Watch).boxed(),
        "d" => unsigned().map(CommandAst::Delete).boxed(),
        "test" => nonempty().map(|path| CommandAst::Test(path.into())).boxed(),
        _ => return None,
    };
    Some(parser.then_ignore(end()).boxed())
}

impl CommandAst {
    /// Parses a debugger command line.  Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<CommandAst>, CommandError> {
        let Ok(parsed) = line_parser().parse(line).into_result() else {
            return Ok(None);
        };
        let Some((name, args)) = parsed else {
            return Ok(None);
        };
        let Some(parser) = args_parser(name) else {
            return Err(CommandError::Unknown(name.to_string()));
        };
        match parser.parse(args).into_result() {
            Ok(command) => Ok(Some(command)),
            Err(errors) => {
                for error in errors.iter() {
                    log::debug!("cannot parse '{line}': {error}");
                }
                let usage = command_info(name).map_or("", |info| info.usage);
                Err(CommandError::Usage { usage })
            }
        }
    }
}

//===========================================================================//

/// The interactive debugger, which drives a [`Simulator`] from command
/// lines.
pub struct Debugger {
    sim: Simulator,
}

impl Debugger {
    /// Returns a debugger controlling the given simulator.
    pub fn new(sim: Simulator) -> Debugger {
        Debugger { sim }
    }

    /// Returns the controlled simulator.
    pub fn sim(&self) -> &Simulator {
        &self.sim
    }

    /// Returns the controlled simulator, for modification.
    pub fn sim_mut(&mut self) -> &mut Simulator {
        &mut self.sim
    }

    /// Runs the program to completion without reading any commands.
    pub fn run_batch(&mut self) -> io::Result<()> {
        self.sim.exec(u64::MAX)
    }

    /// Prompts for and executes commands from stdin until the user quits or
    /// input ends.
    pub fn run_interactive(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            write!(self.sim.output(), "(rv32sim) ")?;
            self.sim.output().flush()?;
            let Some(line) = lines.next() else {
                writeln!(self.sim.output())?;
                return Ok(());
            };
            if !self.execute_line(&line?)? {
                return Ok(());
            }
        }
    }

    /// Executes commands from a script, one per line, until the script quits
    /// or ends.
    pub fn run_script<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            log::debug!("script: {line}");
            if !self.execute_line(&line)? {
                break;
            }
        }
        Ok(())
    }

    /// Parses and executes a single command line.  Returns false if the
    /// session should end.
    pub fn execute_line(&mut self, line: &str) -> io::Result<bool> {
        match CommandAst::parse(line) {
            Ok(Some(command)) => self.execute(command),
            Ok(None) => Ok(true),
            Err(error) => {
                writeln!(self.sim.output(), "{error}")?;
                Ok(true)
            }
        }
    }

    /// Executes a parsed command.  Returns false if the session should end.
    pub fn execute(&mut self, command: CommandAst) -> io::Result<bool> {
        match command {
            CommandAst::Help(name) => self.cmd_help(name.as_deref())?,
            CommandAst::Continue => self.sim.exec(u64::MAX)?,
            CommandAst::Quit => {
                self.sim.quit();
                return Ok(false);
            }
            CommandAst::Step(count) => self.cmd_step(count)?,
            CommandAst::Info(InfoTarget::Registers) => {
                let dump = self.sim.register_dump();
                self.sim.output().write_all(dump.as_bytes())?;
            }
            CommandAst::Info(InfoTarget::Watchpoints) => {
                self.cmd_info_watchpoints()?
            }
            CommandAst::Examine { count, expr } => {
                self.cmd_examine(count, &expr)?
            }
            CommandAst::Print(expr) => self.cmd_print(&expr)?,
            CommandAst::Watch(expr) => self.cmd_watch(&expr)?,
            CommandAst::Delete(id) => self.cmd_delete(id)?,
            CommandAst::Test(path) => self.cmd_test(path)?,
        }
        Ok(true)
    }

    fn cmd_help(&mut self, name: Option<&str>) -> io::Result<()> {
        let out = self.sim.output();
        match name {
            None => {
                for info in COMMANDS.iter() {
                    writeln!(out, "{} - {}", info.name, info.description)?;
                }
            }
            Some(name) => match command_info(name) {
                Some(info) => {
                    writeln!(out, "{} - {}", info.name, info.description)?;
                    writeln!(out, "Usage: {}", info.usage)?;
                }
                None => writeln!(out, "Unknown command '{name}'")?,
            },
        }
        Ok(())
    }

    fn cmd_step(&mut self, count: i64) -> io::Result<()> {
        if count <= 0 {
            writeln!(
                self.sim.output(),
                "Si n, where n is an integer greater than or equal to 1"
            )?;
            return Ok(());
        }
        self.sim.exec(count as u64)
    }

    fn cmd_info_watchpoints(&mut self) -> io::Result<()> {
        let lines: Vec<String> = self
            .sim
            .watchpoints()
            .iter()
            .map(|wp| format!("{}\twatchpoint\t{}", wp.id(), wp.expr()))
            .collect();
        let out = self.sim.output();
        if lines.is_empty() {
            writeln!(out, "No watchpoints.")?;
            return Ok(());
        }
        writeln!(out, "Num\tType\t\tWhat")?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn cmd_examine(&mut self, count: i64, expr: &str) -> io::Result<()> {
        let start = match self.sim.evaluate(expr) {
            Ok(addr) => addr,
            Err(error) => {
                log::warn!("{error}");
                writeln!(self.sim.output(), "Invalid expression")?;
                return Ok(());
            }
        };
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        for index in 0..count {
            let addr = start.wrapping_add(index.wrapping_mul(4));
            let word = self.sim.bus().peek(addr, 4);
            let out = self.sim.output();
            match word {
                Ok(word) => writeln!(out, "0x{addr:08x}: 0x{word:08x}")?,
                Err(_) => {
                    writeln!(out, "Cannot access memory at 0x{addr:08x}")?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn cmd_print(&mut self, expr: &str) -> io::Result<()> {
        match self.sim.evaluate(expr) {
            Ok(value) => writeln!(
                self.sim.output(),
                "Expression value: {value} (0x{value:x})"
            ),
            Err(error) => {
                log::warn!("{error}");
                writeln!(self.sim.output(), "Invalid expression")
            }
        }
    }

    fn cmd_watch(&mut self, expr: &str) -> io::Result<()> {
        let id = match self.sim.watchpoints_mut().allocate(expr) {
            Ok(id) => id,
            Err(error) => {
                return writeln!(self.sim.output(), "Error: {error}");
            }
        };
        match self.sim.evaluate(expr) {
            Ok(value) => {
                self.sim.watchpoints_mut().set_value(id, value);
                writeln!(self.sim.output(), "Watchpoint {id}: {expr}")
            }
            Err(error) => {
                // The slot was just allocated, so releasing it can't fail.
                let _ = self.sim.watchpoints_mut().release(id);
                log::warn!("{error}");
                writeln!(self.sim.output(), "Invalid expression")
            }
        }
    }

    fn cmd_delete(&mut self, id: usize) -> io::Result<()> {
        match self.sim.watchpoints_mut().release(id) {
            Ok(()) => writeln!(self.sim.output(), "Watchpoint {id} deleted."),
            Err(error) => writeln!(self.sim.output(), "Error: {error}"),
        }
    }

    fn cmd_test(&mut self, path: PathBuf) -> io::Result<()> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) => {
                log::warn!("{}: {error}", path.display());
                return writeln!(
                    self.sim.output(),
                    "Cannot open file '{}'",
                    path.display()
                );
            }
        };
        writeln!(
            self.sim.output(),
            "Starting automated test from file '{}'...",
            path.display()
        )?;
        let mut passed = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_num = index + 1;
            let Ok((expected, expr)) =
                test_case().parse(line.trim()).into_result()
            else {
                writeln!(
                    self.sim.output(),
                    "Malformed test at line {line_num}: {line}"
                )?;
                return Ok(());
            };
            let result = self.sim.evaluate(&expr);
            if result == Ok(expected) {
                passed += 1;
                continue;
            }
            let out = self.sim.output();
            writeln!(out, "Validation Failed at line {line_num}!")?;
            writeln!(out, "Expression: {expr}")?;
            writeln!(out, "Expected Result: {expected}")?;
            match result {
                Ok(value) => writeln!(out, "Your Result: {value}")?,
                Err(error) => writeln!(out, "Your Result: error ({error})")?,
            }
            return Ok(());
        }
        writeln!(
            self.sim.output(),
            "Congratulations! All {passed} tests from file '{}' passed!",
            path.display()
        )
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{CommandAst, CommandError, InfoTarget};

    fn parse(line: &str) -> Result<Option<CommandAst>, CommandError> {
        CommandAst::parse(line)
    }

    #[test]
    fn parse_blank_lines() {
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("   \t "), Ok(None));
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse("c"), Ok(Some(CommandAst::Continue)));
        assert_eq!(parse("  q  "), Ok(Some(CommandAst::Quit)));
        assert_eq!(parse("help"), Ok(Some(CommandAst::Help(None))));
        assert_eq!(
            parse("help si"),
            Ok(Some(CommandAst::Help(Some("si".to_string()))))
        );
        assert_eq!(
            parse("info r"),
            Ok(Some(CommandAst::Info(InfoTarget::Registers)))
        );
        assert_eq!(
            parse("info w"),
            Ok(Some(CommandAst::Info(InfoTarget::Watchpoints)))
        );
    }

    #[test]
    fn parse_step_counts() {
        assert_eq!(parse("si"), Ok(Some(CommandAst::Step(1))));
        assert_eq!(parse("si 10"), Ok(Some(CommandAst::Step(10))));
        assert_eq!(parse("si 0"), Ok(Some(CommandAst::Step(0))));
        assert_eq!(parse("si -1"), Ok(Some(CommandAst::Step(-1))));
        assert_eq!(parse("si abc"), Err(CommandError::Usage { usage: "si [N]" }));
    }

    #[test]
    fn parse_expression_commands() {
        assert_eq!(
            parse("x 4 $sp + 8"),
            Ok(Some(CommandAst::Examine {
                count: 4,
                expr: "$sp + 8".to_string()
            }))
        );
        assert_eq!(
            parse("p (1 + 2) * 3"),
            Ok(Some(CommandAst::Print("(1 + 2) * 3".to_string())))
        );
        assert_eq!(
            parse("w *0x80000000"),
            Ok(Some(CommandAst::Watch("*0x80000000".to_string())))
        );
        assert_eq!(parse("d 3"), Ok(Some(CommandAst::Delete(3))));
        assert_eq!(
            parse("test exprs.txt"),
            Ok(Some(CommandAst::Test("exprs.txt".into())))
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse("foo 1"), Err(CommandError::Unknown("foo".to_string())));
        assert_eq!(parse("cont"), Err(CommandError::Unknown("cont".to_string())));
        assert_eq!(parse("p"), Err(CommandError::Usage { usage: "p EXPR" }));
        assert_eq!(parse("x 4"), Err(CommandError::Usage { usage: "x N EXPR" }));
        assert_eq!(parse("info z"), Err(CommandError::Usage { usage: "info r|w" }));
        assert_eq!(parse("c now"), Err(CommandError::Usage { usage: "c" }));
        assert_eq!(parse("d -1"), Err(CommandError::Usage { usage: "d N" }));
        assert_eq!(
            CommandError::Unknown("foo".to_string()).to_string(),
            "Unknown command 'foo'"
        );
    }
}

//===========================================================================//
