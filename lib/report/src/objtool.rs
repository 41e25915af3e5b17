use crate::ReportError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

static INSTRUCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9a-f]+):\s+(.*)$").unwrap());

/// A disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address within the object file.
    pub address: u64,
    pub text: String,
}

/// Access to the object files of the profiled process.
pub trait ObjTool: Send + Sync {
    /// Disassembles the routine named `symbol` (as found in the symbol table) in `binary`.
    fn disassemble(&self, binary: &Path, symbol: &str) -> Result<Vec<Instruction>, ReportError>;
}

/// An [ObjTool] backed by GNU binutils.
#[derive(Debug, Clone)]
pub struct Binutils {
    objdump: PathBuf,
}

impl Binutils {
    pub fn new(objdump: impl Into<PathBuf>) -> Self {
        Self {
            objdump: objdump.into(),
        }
    }
}

impl Default for Binutils {
    fn default() -> Self {
        Self::new("objdump")
    }
}

impl ObjTool for Binutils {
    fn disassemble(&self, binary: &Path, symbol: &str) -> Result<Vec<Instruction>, ReportError> {
        let output = Command::new(&self.objdump)
            .arg(format!("--disassemble={symbol}"))
            .arg("--no-show-raw-insn")
            .arg(binary)
            .output()
            .map_err(|e| {
                ReportError::ObjTool(format!(
                    "cannot run {}: {e}",
                    self.objdump.display()
                ))
            })?;
        if !output.status.success() {
            return Err(ReportError::ObjTool(format!(
                "{} failed: {}",
                self.objdump.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let instructions = parse_objdump(&String::from_utf8_lossy(&output.stdout));
        if instructions.is_empty() {
            return Err(ReportError::ObjTool(format!(
                "symbol {symbol} not found in {}",
                binary.display()
            )));
        }
        Ok(instructions)
    }
}

fn parse_objdump(output: &str) -> Vec<Instruction> {
    output
        .lines()
        .filter_map(|line| {
            let captures = INSTRUCTION.captures(line)?;
            Some(Instruction {
                address: u64::from_str_radix(&captures[1], 16).ok()?,
                text: captures[2].trim().to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_objdump_output() {
        let output = "
/usr/bin/app:     file format elf64-x86-64


Disassembly of section .text:

0000000000001139 <main>:
    1139:	push   %rbp
    113a:	mov    %rsp,%rbp
    113d:	ret
";
        let instructions = parse_objdump(output);
        assert_eq!(instructions.len(), 3);
        assert_eq!(
            instructions[1],
            Instruction {
                address: 0x113a,
                text: "mov    %rsp,%rbp".to_owned(),
            }
        );
    }

    #[test]
    fn reports_missing_tools() {
        let tool = Binutils::new("/nonexistent/objdump");
        let result = tool.disassemble(Path::new("/nonexistent/binary"), "main");
        assert!(matches!(result, Err(ReportError::ObjTool(_))));
    }
}
