//! 用户交互
//!
//! 编排器只在阶段之间调用，不会和后端任务并发。

use crate::core::direction::Direction;
use crate::core::endpoint::EndpointKey;
use crate::core::song::Song;
use crate::error::{Result, SyncError};
use std::io::{BufRead, Write};

/// 逐首确认时的回答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAnswer {
    Yes,
    No,
    /// 停止询问，只保留已确认的歌曲
    Quit,
}

pub trait Ui {
    /// 询问一对端点的同步方向，`enabled` 非空；用户退出时返回 `SyncError::Quit`
    fn ask_direction(
        &mut self,
        left: &EndpointKey,
        right: &EndpointKey,
        enabled: &[Direction],
    ) -> Result<Direction>;

    fn ask_strict_search(&mut self, endpoint: &EndpointKey) -> Result<bool>;

    fn ask_interactive(&mut self, endpoint: &EndpointKey) -> Result<bool>;

    fn ask_add_song(&mut self, endpoint: &EndpointKey, song: &Song) -> Result<AddAnswer>;

    fn message(&mut self, text: &str);
}

/// 终端交互，读写都可替换，方便测试
pub struct TerminalUi<R, W> {
    input: R,
    output: W,
}

impl TerminalUi<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// 提示写到 stderr，stdout 留给报告
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalUi<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// 输出提示并读取一行，输入结束视为退出
    fn prompt(&mut self, text: &str) -> Result<String> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(SyncError::Quit);
        }
        Ok(line.trim().to_lowercase())
    }

    /// y/n/q 问题，直接回车为 yes
    fn ask_yes_no(&mut self, question: &str) -> Result<AddAnswer> {
        loop {
            match self.prompt(&format!("{} [Y/n/q] ", question))?.as_str() {
                "" | "y" | "yes" => return Ok(AddAnswer::Yes),
                "n" | "no" => return Ok(AddAnswer::No),
                "q" | "quit" => return Ok(AddAnswer::Quit),
                other => writeln!(self.output, "unrecognized answer {:?}", other)?,
            }
        }
    }

    fn ask_flag(&mut self, question: &str) -> Result<bool> {
        match self.ask_yes_no(question)? {
            AddAnswer::Yes => Ok(true),
            AddAnswer::No => Ok(false),
            AddAnswer::Quit => Err(SyncError::Quit),
        }
    }
}

impl<R: BufRead, W: Write> Ui for TerminalUi<R, W> {
    fn ask_direction(
        &mut self,
        left: &EndpointKey,
        right: &EndpointKey,
        enabled: &[Direction],
    ) -> Result<Direction> {
        let default = if enabled.contains(&Direction::Both) {
            Direction::Both
        } else {
            enabled
                .first()
                .copied()
                .ok_or_else(|| SyncError::MalformedInput(format!("no direction possible between {} and {}", left, right)))?
        };
        let choices: String = enabled.iter().map(|d| d.symbol()).collect();

        writeln!(self.output, "1: {}", left)?;
        writeln!(self.output, "2: {}", right)?;
        loop {
            let answer = self.prompt(&format!(
                "direction '<' (2 to 1), '>' (1 to 2), '=' (both) [{}q] ({}) ",
                choices,
                default.symbol()
            ))?;

            let mut chars = answer.chars();
            match (chars.next(), chars.next()) {
                (None, _) => return Ok(default),
                (Some('q'), None) => return Err(SyncError::Quit),
                (Some(c), None) => match Direction::from_symbol(c) {
                    Some(direction) if enabled.contains(&direction) => return Ok(direction),
                    _ => writeln!(self.output, "choose one of {}q", choices)?,
                },
                _ => writeln!(self.output, "choose one of {}q", choices)?,
            }
        }
    }

    fn ask_strict_search(&mut self, endpoint: &EndpointKey) -> Result<bool> {
        self.ask_flag(&format!("{}: search only identical songs?", endpoint))
    }

    fn ask_interactive(&mut self, endpoint: &EndpointKey) -> Result<bool> {
        self.ask_flag(&format!("{}: confirm every song before adding?", endpoint))
    }

    fn ask_add_song(&mut self, endpoint: &EndpointKey, song: &Song) -> Result<AddAnswer> {
        self.ask_yes_no(&format!("add {} to {}?", song, endpoint))
    }

    fn message(&mut self, text: &str) {
        let _ = writeln!(self.output, "{}", text);
    }
}
