use crate::{ObjTool, Report, ReportError};
use profscope_model::{percentage, FunctionId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct Routine {
    flat: i64,
    cum: i64,
    /// `(flat, cum)` per object file address.
    addresses: BTreeMap<u64, (i64, i64)>,
    binary: Option<PathBuf>,
}

/// Writes annotated disassembly for every function matching the symbol of a disasm command.
///
/// Sampled addresses are translated into object file addresses through the mappings of the
/// profile. Routines that cannot be disassembled are reported inline.
pub fn print_assembly(
    out: &mut impl Write,
    report: &Report,
    obj: &dyn ObjTool,
    limit: usize,
) -> Result<(), ReportError> {
    let symbol = report
        .command()
        .symbol()
        .ok_or_else(|| ReportError::MissingFocus("disasm".to_owned()))?;
    let profile = report.profile();
    let total = report.total();

    let mut routines = HashMap::<FunctionId, Routine>::new();
    for stack in report.stacks() {
        let mut seen = HashSet::new();
        for (position, frame) in stack.frames.iter().enumerate() {
            let Some(id) = frame.function else {
                continue;
            };
            if !symbol.is_match(&profile.function(id).name) {
                continue;
            }
            let routine = routines.entry(id).or_default();
            let mapping = profile
                .location(frame.location)
                .mapping
                .map(|index| &profile.mappings[index]);
            if routine.binary.is_none() {
                routine.binary = mapping.map(|m| m.file.clone());
            }
            let first_visit = seen.insert(id);
            if position == 0 {
                routine.flat += stack.value;
            }
            if first_visit {
                routine.cum += stack.value;
            }
            if let Some(mapping) = mapping.filter(|_| frame.address != 0) {
                let values = routine
                    .addresses
                    .entry(mapping.object_address(frame.address))
                    .or_default();
                if position == 0 {
                    values.0 += stack.value;
                }
                if first_visit {
                    values.1 += stack.value;
                }
            }
        }
    }
    if routines.is_empty() {
        return Err(ReportError::NoMatches(symbol.as_str().to_owned()));
    }

    let mut routines = routines.into_iter().collect::<Vec<_>>();
    routines.sort_by(|(a_id, a), (b_id, b)| {
        b.flat
            .cmp(&a.flat)
            .then_with(|| b.cum.cmp(&a.cum))
            .then_with(|| profile.function(*a_id).name.cmp(&profile.function(*b_id).name))
    });

    let value = |v: i64| {
        if v == 0 {
            ".".to_owned()
        } else {
            report.format_value(v)
        }
    };
    for (id, routine) in routines.into_iter().take(limit) {
        let function = profile.function(id);
        writeln!(out, "ROUTINE ======================== {}", function.name)?;
        writeln!(
            out,
            "{:>10} {:>10} (flat, cum) {} of Total",
            report.format_value(routine.flat),
            report.format_value(routine.cum),
            percentage(routine.cum, total)
        )?;

        let Some(binary) = routine
            .binary
            .as_ref()
            .or_else(|| profile.main_binary().map(|m| &m.file))
        else {
            writeln!(out, "  error: no object file for {}", function.name)?;
            continue;
        };
        let instructions = match obj.disassemble(binary, &function.system_name) {
            Ok(instructions) => instructions,
            Err(error) => {
                tracing::debug!("cannot disassemble {}: {error}", function.name);
                writeln!(out, "  error: {error}")?;
                continue;
            }
        };
        for instruction in instructions {
            let (flat, cum) = routine
                .addresses
                .get(&instruction.address)
                .copied()
                .unwrap_or_default();
            writeln!(
                out,
                "{:>10} {:>10} {:>16x}: {}",
                value(flat),
                value(cum),
                instruction.address,
                instruction.text
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::report_for;
    use crate::{build_report, Command, Diagnostics, Instruction, ReportOptions};
    use profscope_model::{Line, Mapping, ProfileBuilder, ValueType};
    use std::path::Path;
    use std::sync::Arc;

    struct FakeObjTool;

    impl ObjTool for FakeObjTool {
        fn disassemble(
            &self,
            binary: &Path,
            symbol: &str,
        ) -> Result<Vec<Instruction>, ReportError> {
            assert_eq!(binary, Path::new("/usr/bin/app"));
            assert_eq!(symbol, "_ZN3app3hotE");
            Ok((0..4)
                .map(|i| Instruction {
                    address: 0x1000 + i * 4,
                    text: format!("insn {i}"),
                })
                .collect())
        }
    }

    #[test]
    fn annotates_instructions_with_samples() {
        let mut builder = ProfileBuilder::new(vec![ValueType::new("alloc_space", "bytes")])
            .mappings(vec![Mapping {
                start: 0x40_0000,
                limit: 0x50_0000,
                offset: 0,
                file: "/usr/bin/app".into(),
            }]);
        let hot = builder.function("app::hot", "_ZN3app3hotE", None);
        let main = builder.function("app::main", "_ZN3app4mainE", None);
        let leaf = builder.location(0x40_1004, vec![Line { function: hot, line: 1 }]);
        let caller = builder.location(0x40_2000, vec![Line { function: main, line: 2 }]);
        builder
            .add_sample(vec![leaf, caller], vec![2048], BTreeMap::new())
            .unwrap();
        let report = build_report(
            Arc::new(builder.build()),
            Command::parse(&["disasm", "hot"]).unwrap(),
            ReportOptions::default(),
            &mut Diagnostics::default(),
        )
        .unwrap();

        let mut out = String::new();
        print_assembly(&mut out, &report, &FakeObjTool, 10).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "ROUTINE ======================== app::hot");
        assert!(lines[1].contains("(flat, cum)   100% of Total"));
        assert!(lines[2].ends_with("1000: insn 0"));
        assert!(lines[3].starts_with(&format!("{:>10} {:>10}", "2kB", "2kB")));
        assert!(lines[3].ends_with("1004: insn 1"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn reports_missing_object_files_inline() {
        let report = report_for(&["disasm", "app::compute"], &[]);
        let mut out = String::new();
        print_assembly(&mut out, &report, &FakeObjTool, 10).unwrap();
        assert!(out.contains("error: no object file for app::compute"));
    }
}
