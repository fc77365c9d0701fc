use std::io::{self, IsTerminal};

use inksac::prelude::*;

use crate::process::pipeline::PIPE;
use crate::process::redirect::{INPUT, OUTPUT};

#[derive(Debug, Clone, Copy)]
pub struct SyntaxHighlighter {
    color_support: ColorSupport,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    /// Colors only when diagnostics land on a terminal.
    pub fn new() -> Self {
        let support = if io::stderr().is_terminal() {
            check_color_support().unwrap_or(ColorSupport::NoColor)
        } else {
            ColorSupport::NoColor
        };
        Self {
            color_support: support,
        }
    }

    pub fn plain() -> Self {
        Self {
            color_support: ColorSupport::NoColor,
        }
    }

    fn enabled(&self) -> bool {
        !matches!(self.color_support, ColorSupport::NoColor)
    }

    /// Colors command words and operators in place; whitespace is preserved
    /// so the editor's cursor math stays valid.
    pub fn highlight_command(&self, input: &str) -> String {
        if !self.enabled() {
            return input.to_string();
        }

        let mut out = String::with_capacity(input.len());
        let mut expect_command = true;
        let mut rest = input;

        while !rest.is_empty() {
            let word_start = rest
                .find(|c: char| !c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            out.push_str(&rest[..word_start]);
            rest = &rest[word_start..];

            let word_end = rest
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            let word = &rest[..word_end];
            rest = &rest[word_end..];

            if word.is_empty() {
                break;
            }

            if word == PIPE || word == INPUT || word == OUTPUT {
                let operator_style = Style::builder()
                    .foreground(Color::Yellow)
                    .bold()
                    .build();
                out.push_str(&word.style(operator_style).to_string());
                expect_command = word == PIPE;
            } else if expect_command {
                let command_style = Style::builder()
                    .foreground(Color::Cyan)
                    .bold()
                    .build();
                out.push_str(&word.style(command_style).to_string());
                expect_command = false;
            } else {
                out.push_str(word);
            }
        }

        out
    }

    pub fn highlight_error(&self, error: &str) -> String {
        if !self.enabled() {
            return error.to_string();
        }

        let error_style = Style::builder()
            .foreground(Color::Red)
            .bold()
            .build();

        error.style(error_style).to_string()
    }

    pub fn highlight_notice(&self, message: &str) -> String {
        if !self.enabled() {
            return message.to_string();
        }

        let notice_style = Style::builder()
            .foreground(Color::Yellow)
            .build();

        message.style(notice_style).to_string()
    }

    pub fn highlight_hint(&self, hint: &str) -> String {
        if !self.enabled() {
            return hint.to_string();
        }

        let hint_style = Style::builder()
            .foreground(Color::RGB(128, 128, 128))
            .build();

        hint.style(hint_style).to_string()
    }
}
