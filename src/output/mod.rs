//! 报告输出模块
//!
//! 将一次运行的结果列表渲染为JUnit XML或CSV文档。两种格式消费同一份
//! 结果列表；为了产出可复现、可对比的报告，渲染前先按
//! （金丝雀、检查类型、检查名称）做稳定排序。

use crate::checks::CheckResult;

/// 报告格式化器
pub trait ReportFormatter {
    /// 将结果列表渲染为文档
    fn format(&self, results: &[CheckResult]) -> String;
}

/// 跨金丝雀到达顺序不确定，报告使用显式的确定性排序
pub fn sorted(results: &[CheckResult]) -> Vec<&CheckResult> {
    let mut sorted: Vec<&CheckResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.namespace, &a.canary, &a.check_kind, &a.check_name).cmp(&(
            &b.namespace,
            &b.canary,
            &b.check_kind,
            &b.check_name,
        ))
    });
    sorted
}

/// JUnit XML格式化器，每个金丝雀一个testsuite
pub struct JunitFormatter;

impl JunitFormatter {
    pub fn new() -> Self {
        JunitFormatter
    }

    fn escape_xml(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&apos;"),
                c => result.push(c),
            }
        }
        result
    }
}

impl Default for JunitFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JunitFormatter {
    fn format(&self, results: &[CheckResult]) -> String {
        let sorted = sorted(results);
        let failures = sorted.iter().filter(|r| !r.pass).count();
        let total_ms: u64 = sorted.iter().map(|r| r.duration_ms).sum();

        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        output.push_str(&format!(
            "<testsuites tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            sorted.len(),
            failures,
            total_ms as f64 / 1000.0
        ));

        let mut index = 0;
        while index < sorted.len() {
            let suite_key = (&sorted[index].namespace, &sorted[index].canary);
            let suite: Vec<_> = sorted[index..]
                .iter()
                .take_while(|r| (&r.namespace, &r.canary) == suite_key)
                .collect();

            let suite_failures = suite.iter().filter(|r| !r.pass).count();
            let suite_ms: u64 = suite.iter().map(|r| r.duration_ms).sum();
            output.push_str(&format!(
                "  <testsuite name=\"{}/{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
                Self::escape_xml(suite_key.0),
                Self::escape_xml(suite_key.1),
                suite.len(),
                suite_failures,
                suite_ms as f64 / 1000.0
            ));

            for result in &suite {
                output.push_str(&format!(
                    "    <testcase name=\"{}/{}\" classname=\"{}.{}\" time=\"{:.3}\"",
                    Self::escape_xml(&result.check_kind),
                    Self::escape_xml(&result.check_name),
                    crate::APP_NAME,
                    Self::escape_xml(&result.canary),
                    result.duration_ms as f64 / 1000.0
                ));
                if result.pass {
                    output.push_str("/>\n");
                } else {
                    let message = result.message.as_deref().unwrap_or("check failed");
                    output.push_str(&format!(
                        ">\n      <failure message=\"{}\"/>\n    </testcase>\n",
                        Self::escape_xml(message)
                    ));
                }
            }

            output.push_str("  </testsuite>\n");
            index += suite.len();
        }

        output.push_str("</testsuites>\n");
        output
    }
}

/// CSV格式化器，表头加每个结果一行
pub struct CsvFormatter;

impl CsvFormatter {
    pub fn new() -> Self {
        CsvFormatter
    }

    fn escape_csv(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for CsvFormatter {
    fn format(&self, results: &[CheckResult]) -> String {
        let mut output =
            String::from("namespace,canary,checkType,checkName,endpoint,pass,durationMs,message\n");

        for result in sorted(results) {
            let duration = result.duration_ms.to_string();
            let row: [&str; 8] = [
                result.namespace.as_str(),
                result.canary.as_str(),
                result.check_kind.as_str(),
                result.check_name.as_str(),
                result.endpoint.as_str(),
                if result.pass { "true" } else { "false" },
                duration.as_str(),
                result.message.as_deref().unwrap_or(""),
            ];
            let line = row
                .iter()
                .map(|field| Self::escape_csv(field))
                .collect::<Vec<_>>()
                .join(",");
            output.push_str(&line);
            output.push('\n');
        }

        output
    }
}
