use anyhow::Result;
use clausecheck_config::Config;
use clausecheck_utils::canonicalization::emit_jcs;
use clausecheck_utils::exit_codes::ExitCode;

use crate::cli::args::HistoryCommands;
use crate::history::{HistoryStats, ReviewHistory, ReviewRecord};

/// Execute a `history` subcommand against the configured history file.
pub fn execute_history_command(command: HistoryCommands, config: &Config) -> Result<ExitCode> {
    let mut history = ReviewHistory::load(config.history_path())?;

    match command {
        HistoryCommands::List { limit, json } => {
            let records = history.list(Some(limit));
            if json {
                println!("{}", emit_jcs(&records)?);
            } else if records.is_empty() {
                println!("暂无审查记录");
            } else {
                for record in records {
                    println!("{}", format_row(record));
                }
            }
        }
        HistoryCommands::Show { id, json } => {
            let Some(record) = history.get(&id) else {
                eprintln!("✗ No review record with id '{id}'");
                return Ok(ExitCode::CLI_ARGS);
            };
            if json {
                println!("{}", emit_jcs(record)?);
            } else {
                print!("{}", format_detail(record));
            }
        }
        HistoryCommands::Search { keyword, json } => {
            let matches = history.search(&keyword);
            if json {
                println!("{}", emit_jcs(&matches)?);
            } else if matches.is_empty() {
                println!("未找到与 '{keyword}' 匹配的记录");
            } else {
                for record in matches {
                    println!("{}", format_row(record));
                }
            }
        }
        HistoryCommands::Delete { id } => {
            if !history.delete(&id)? {
                eprintln!("✗ No review record with id '{id}'");
                return Ok(ExitCode::CLI_ARGS);
            }
            println!("已删除记录 {id}");
        }
        HistoryCommands::Clear { yes } => {
            if !yes {
                eprintln!(
                    "✗ Refusing to delete {} records without --yes",
                    history.len()
                );
                return Ok(ExitCode::CLI_ARGS);
            }
            let count = history.len();
            history.clear()?;
            println!("已清空 {count} 条记录");
        }
        HistoryCommands::Stats { json } => {
            let stats = history.statistics();
            if json {
                println!("{}", emit_jcs(&stats)?);
            } else {
                print!("{}", format_stats(&stats));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn format_row(record: &ReviewRecord) -> String {
    format!(
        "{}  {}  {:<8}  {}  {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.status.to_string(),
        record.contract_type,
        record.file_name
    )
}

fn format_detail(record: &ReviewRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("ID: {}\n", record.id));
    out.push_str(&format!(
        "时间: {}\n",
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("文件: {}\n", record.file_path));
    out.push_str(&format!("客户身份: {}\n", record.identity.label()));
    out.push_str(&format!("合同类型: {}\n", record.contract_type));
    if !record.focus_points.is_empty() {
        out.push_str(&format!("关注要点: {}\n", record.focus_points.join("、")));
    }
    out.push_str(&format!("模型: {} ({})\n", record.model, record.provider));
    out.push_str(&format!("状态: {}\n", record.status));
    if let Some(summary) = &record.summary {
        out.push_str(&format!("结果: {summary}\n"));
    }
    if let Some(path) = &record.report_path {
        out.push_str(&format!("报告: {path}\n"));
    }
    if let Some(error) = &record.error_message {
        out.push_str(&format!("错误: {error}\n"));
    }
    out
}

fn format_stats(stats: &HistoryStats) -> String {
    let mut out = format!("总计: {} 次审查\n", stats.total);
    out.push_str("\n按状态:\n");
    for (status, count) in &stats.by_status {
        out.push_str(&format!("  {status}: {count}\n"));
    }
    out.push_str("\n按合同类型:\n");
    for (contract_type, count) in &stats.by_contract_type {
        out.push_str(&format!("  {contract_type}: {count}\n"));
    }
    out.push_str("\n按模型提供方:\n");
    for (provider, count) in &stats.by_provider {
        out.push_str(&format!("  {provider}: {count}\n"));
    }
    out
}
