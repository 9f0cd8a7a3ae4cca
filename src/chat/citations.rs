use super::types::Citation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanSegment {
    Text(String),
    Cited {
        text: String,
        citation_index: usize,
        marker: i64,
    },
}

/// Split `content` into plain and cited runs. Offsets are characters into the
/// unmodified content; on overlap the leftmost span wins.
pub fn embed_spans(content: &str, citations: &[Citation]) -> Vec<SpanSegment> {
    let bounds: Vec<usize> = content
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(content.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut spans: Vec<(usize, usize, usize)> = citations
        .iter()
        .enumerate()
        .filter_map(|(index, citation)| {
            let span = citation.text_span?;
            let end = span.end.min(char_len);
            (span.start < end).then_some((span.start, end, index))
        })
        .collect();
    spans.sort_by_key(|&(start, _, index)| (start, index));

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end, index) in spans {
        if start < cursor {
            log::debug!(
                "citation {} span {}..{} overlaps an earlier span, not embedded",
                index,
                start,
                end
            );
            continue;
        }
        if start > cursor {
            segments.push(SpanSegment::Text(content[bounds[cursor]..bounds[start]].to_string()));
        }
        segments.push(SpanSegment::Cited {
            text: content[bounds[start]..bounds[end]].to_string(),
            citation_index: index,
            marker: citations[index].source_id.unwrap_or(index as i64),
        });
        cursor = end;
    }
    if cursor < char_len || segments.is_empty() {
        segments.push(SpanSegment::Text(content[bounds[cursor]..].to_string()));
    }

    segments
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSegment {
    Text(String),
    Marker {
        raw: String,
        number: u64,
        citation_index: usize,
    },
    /// A `[n]` marker that matched no citation. Still rendered, flagged as missing.
    Missing { raw: String, number: u64 },
}

// source_id match first, then 1-based position
pub fn resolve_marker(number: u64, citations: &[Citation]) -> Option<usize> {
    if let Some(index) = citations
        .iter()
        .position(|c| c.source_id.is_some_and(|id| id >= 0 && id as u64 == number))
    {
        return Some(index);
    }

    let position = usize::try_from(number).ok()?.checked_sub(1)?;
    (position < citations.len()).then_some(position)
}

pub fn resolve_markers(answer: &str, citations: &[Citation]) -> Vec<AnswerSegment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = answer;

    while let Some(open) = rest.find('[') {
        let (before, from_open) = rest.split_at(open);
        text.push_str(before);

        match parse_marker(from_open) {
            Some((number, len)) => {
                if !text.is_empty() {
                    segments.push(AnswerSegment::Text(std::mem::take(&mut text)));
                }
                let raw = from_open[..len].to_string();
                segments.push(match resolve_marker(number, citations) {
                    Some(citation_index) => AnswerSegment::Marker {
                        raw,
                        number,
                        citation_index,
                    },
                    None => {
                        log::warn!(
                            "citation marker {} not found among {} citations",
                            raw,
                            citations.len()
                        );
                        AnswerSegment::Missing { raw, number }
                    }
                });
                rest = &from_open[len..];
            }
            None => {
                text.push('[');
                rest = &from_open[1..];
            }
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        segments.push(AnswerSegment::Text(text));
    }

    segments
}

// `[123]` at the start of `s`: returns the number and the byte length consumed
fn parse_marker(s: &str) -> Option<(u64, usize)> {
    let inner = s.strip_prefix('[')?;
    let digits = inner.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || inner.as_bytes().get(digits) != Some(&b']') {
        return None;
    }
    let number = inner[..digits].parse().ok()?;
    Some((number, digits + 2))
}

// numbers whose source_id match and positional match disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerCollision {
    pub number: u64,
    pub by_source_id: usize,
    pub by_position: usize,
}

pub fn collisions(citations: &[Citation]) -> Vec<MarkerCollision> {
    citations
        .iter()
        .enumerate()
        .filter_map(|(index, citation)| {
            let number = u64::try_from(citation.source_id?).ok()?;
            // the first citation claiming this id is the one markers bind to
            let by_source_id = resolve_marker(number, citations)?;
            if by_source_id != index {
                return None;
            }
            let by_position = usize::try_from(number).ok()?.checked_sub(1)?;
            (by_position < citations.len() && by_position != by_source_id).then_some(
                MarkerCollision {
                    number,
                    by_source_id,
                    by_position,
                },
            )
        })
        .collect()
}

/// Ordered, de-duplicated reference numbers that appear in `answer`.
pub fn referenced_numbers(answer: &str) -> Vec<u64> {
    let mut numbers: Vec<u64> = answer
        .match_indices('[')
        .filter_map(|(at, _)| parse_marker(&answer[at..]).map(|(number, _)| number))
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}
