/// Extract candidate subject lines from raw generator output.
///
/// Every non-empty line (after trimming) is one candidate, in source order.
/// `max == 0` keeps all of them. Numbering such as `1. feat: ...` is passed
/// through untouched; generators are told not to emit it.
pub fn parse_candidates(output: &str, max: usize) -> Vec<String> {
    let lines = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string);

    if max == 0 {
        lines.collect()
    } else {
        lines.take(max).collect()
    }
}
