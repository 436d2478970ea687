use log::info;
use policy_core::{Result, SeccompSupport};
use policy_seccomp::action::describe;
use policy_seccomp::syscall_table::native_table;
use policy_seccomp::{validate, CompiledFilter, CompiledRule, FilterBuilder, Policy};
use serde_json::{json, Value};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Decode and validate the policy in `path`
pub fn validate_file(path: &Path) -> Result<()> {
    info!("Validating {}", path.display());
    let content = fs::read_to_string(path)?;
    validate(&content)
}

/// Build the policy in `path` and render the filter as text or JSON
pub fn compile_file(path: &Path, as_json: bool) -> Result<String> {
    info!("Compiling {}", path.display());
    let file = fs::File::open(path)?;
    let policy = Policy::from_reader(file)?;
    let filter = FilterBuilder::native().compile(&policy)?;
    let programs = filter.to_bpf_programs()?;
    let instructions: Vec<usize> = programs.iter().map(Vec::len).collect();

    if as_json {
        let report = filter_json(&filter, &instructions);
        return Ok(serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string()));
    }

    Ok(filter_text(&filter, &instructions))
}

fn syscall_label(number: i64) -> String {
    match native_table().get_name(number) {
        Some(name) => format!("{} ({})", name, number),
        None => number.to_string(),
    }
}

fn conditions(rule: &CompiledRule) -> Vec<String> {
    rule.conditions.iter().map(|c| format!("{:?}", c)).collect()
}

fn filter_text(filter: &CompiledFilter, instructions: &[usize]) -> String {
    let mut out = String::new();
    let arches: Vec<String> = filter
        .architectures()
        .iter()
        .map(|arch| arch.to_string())
        .collect();

    let _ = writeln!(out, "default action: {}", describe(filter.default_action()));
    let _ = writeln!(out, "architectures:  {}", arches.join(", "));
    let _ = writeln!(out, "rules:          {}", filter.rule_count());
    for rule in filter.rules() {
        let _ = write!(
            out,
            "  {:24} -> {}",
            syscall_label(rule.syscall),
            describe(&rule.action)
        );
        if rule.is_conditional() {
            let _ = write!(out, " if {}", conditions(rule).join(" && "));
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "bpf programs:   {} ({} instructions)",
        instructions.len(),
        instructions.iter().sum::<usize>()
    );
    out
}

fn filter_json(filter: &CompiledFilter, instructions: &[usize]) -> Value {
    let rules: Vec<Value> = filter
        .rules()
        .iter()
        .map(|rule| {
            json!({
                "syscall": rule.syscall,
                "name": native_table().get_name(rule.syscall),
                "action": describe(&rule.action),
                "conditions": conditions(rule),
            })
        })
        .collect();

    json!({
        "defaultAction": describe(filter.default_action()),
        "architectures": filter
            .architectures()
            .iter()
            .map(|arch| arch.as_str())
            .collect::<Vec<_>>(),
        "noNewPrivs": filter.no_new_privs(),
        "rules": rules,
        "bpfInstructions": instructions,
    })
}

/// Report whether this kernel can install seccomp filters
pub fn check_requirements() -> String {
    info!("Checking seccomp support");
    let support = SeccompSupport::detect();
    let mut out = String::from("Checking seccomp support...\n\n");

    if support.can_install() {
        out.push_str("[✓] Seccomp filter mode available\n");
    } else {
        out.push_str("[✗] Seccomp filter mode NOT available\n");
    }

    for action in ["kill_process", "errno", "trap", "trace", "log"] {
        let mark = if support.supports_action(action) {
            "✓"
        } else {
            "✗"
        };
        let _ = writeln!(out, "[{}] Action {}", mark, action);
    }

    let _ = write!(out, "\n{}", support.summary());
    out
}
