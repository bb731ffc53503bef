use std::cmp::Ordering;

use lumen_core::{TextRange, TextSize};

use crate::fold_byte;

/// The kind of match that was produced. Later variants rank higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// General fuzzy subsequence match.
    Fuzzy,
    /// `candidate` starts with `query`.
    Prefix,
    /// `candidate` equals `query`.
    Exact,
}

/// Outcome of matching a query against one candidate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub kind: MatchKind,
    pub score: i32,
    /// Every matched byte was identical, not merely equal after case folding.
    pub case_sensitive: bool,
    /// Matched byte ranges in the candidate, coalesced over consecutive runs.
    pub spans: Vec<TextRange>,
}

impl PatternMatch {
    pub fn rank_key(&self) -> RankKey {
        RankKey {
            kind: self.kind,
            score: self.score,
            case_sensitive: self.case_sensitive,
        }
    }
}

/// A key that defines stable ordering for matches: kind, then score, then
/// case sensitivity as the final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankKey {
    kind: MatchKind,
    score: i32,
    case_sensitive: bool,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.kind, self.score, self.case_sensitive).cmp(&(
            other.kind,
            other.score,
            other.case_sensitive,
        ))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const MIN_SCORE: i32 = i32::MIN / 4;

const BASE_MATCH: i32 = 10;
const BONUS_WORD_START: i32 = 15;
const BONUS_CONSECUTIVE: i32 = 5;
const GAP_PENALTY: i32 = 1;
const LEADING_PENALTY: i32 = 1;
const TRAILING_PENALTY: i32 = 1;

#[inline]
fn is_separator(b: u8) -> bool {
    matches!(
        b,
        b'_' | b'-' | b' ' | b'/' | b'\\' | b'.' | b':' | b'<' | b'>' | b'(' | b')' | b'['
            | b']'
    )
}

fn case_bonus(query: u8, candidate: u8) -> i32 {
    if query == candidate {
        2
    } else {
        0
    }
}

fn coalesce_spans(positions: &[usize]) -> Vec<TextRange> {
    let mut spans: Vec<TextRange> = Vec::new();
    for &p in positions {
        let p = p as u32;
        match spans.last_mut() {
            Some(last) if u32::from(last.end()) == p => {
                *last = TextRange::new(last.start(), TextSize::from(p + 1));
            }
            _ => spans.push(TextRange::new(TextSize::from(p), TextSize::from(p + 1))),
        }
    }
    spans
}

/// Reusable pattern matcher that avoids per-candidate allocations.
///
/// The dynamic-programming tables are kept across calls; the matched-position
/// backtrack is the only per-match allocation.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    query: Vec<u8>,
    query_folded: Vec<u8>,
    exact_case: bool,
    scores: Vec<i32>,
    parents: Vec<i32>,
    word_starts: Vec<bool>,
}

impl FuzzyMatcher {
    pub fn new(query: &str) -> Self {
        Self::with_mode(query, false)
    }

    /// A matcher that requires exact byte equality (no case folding). Used for
    /// non-language candidate sets configured for case-sensitive matching.
    pub fn case_sensitive(query: &str) -> Self {
        Self::with_mode(query, true)
    }

    fn with_mode(query: &str, exact_case: bool) -> Self {
        let query_bytes = query.as_bytes().to_vec();
        let query_folded = if exact_case {
            query_bytes.clone()
        } else {
            query_bytes.iter().copied().map(fold_byte).collect()
        };
        Self {
            query: query_bytes,
            query_folded,
            exact_case,
            scores: Vec::new(),
            parents: Vec::new(),
            word_starts: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        // The bytes came from a &str.
        std::str::from_utf8(&self.query).unwrap_or("")
    }

    #[inline]
    fn fold(&self, b: u8) -> u8 {
        if self.exact_case {
            b
        } else {
            fold_byte(b)
        }
    }

    pub fn score(&mut self, candidate: &str) -> Option<PatternMatch> {
        let c = candidate.as_bytes();

        if self.query.is_empty() {
            return Some(PatternMatch {
                kind: MatchKind::Prefix,
                score: 0,
                case_sensitive: true,
                spans: Vec::new(),
            });
        }

        if self.query_folded.len() <= c.len()
            && c.iter()
                .zip(self.query_folded.iter())
                .all(|(&cb, &qb)| self.fold(cb) == qb)
        {
            let kind = if c.len() == self.query.len() {
                MatchKind::Exact
            } else {
                MatchKind::Prefix
            };
            // Shorter candidates rank higher for the same query.
            let score = 1_000_000 - c.len() as i32;
            let case_sensitive = c[..self.query.len()] == self.query[..];
            return Some(PatternMatch {
                kind,
                score,
                case_sensitive,
                spans: vec![TextRange::new(
                    TextSize::from(0),
                    TextSize::from(self.query.len() as u32),
                )],
            });
        }

        self.subsequence(c)
    }

    fn subsequence(&mut self, candidate: &[u8]) -> Option<PatternMatch> {
        let m = self.query.len();
        let n = candidate.len();
        if m > n {
            return None;
        }

        self.word_starts.resize(n, false);
        for (j, &b) in candidate.iter().enumerate() {
            if j == 0 {
                self.word_starts[j] = true;
                continue;
            }
            let prev = candidate[j - 1];
            self.word_starts[j] = is_separator(prev)
                || (prev.is_ascii_lowercase() && b.is_ascii_uppercase())
                || (prev.is_ascii_alphabetic() && b.is_ascii_digit())
                || (prev.is_ascii_digit() && b.is_ascii_alphabetic());
        }

        self.scores.clear();
        self.scores.resize(m * n, MIN_SCORE);
        self.parents.clear();
        self.parents.resize(m * n, -1);

        let exact_case = self.exact_case;
        let fold = move |b: u8| if exact_case { b } else { fold_byte(b) };

        let q0 = self.query[0];
        let q0_folded = self.query_folded[0];
        for (j, &c) in candidate.iter().enumerate() {
            if fold(c) != q0_folded {
                continue;
            }
            let mut score = BASE_MATCH;
            if self.word_starts[j] {
                score += BONUS_WORD_START;
            }
            score += case_bonus(q0, c);
            score -= LEADING_PENALTY * (j as i32);
            self.scores[j] = score;
        }

        for i in 1..m {
            let q = self.query[i];
            let q_folded = self.query_folded[i];
            let (done, rest) = self.scores.split_at_mut(i * n);
            let prev_row = &done[(i - 1) * n..];
            let cur_row = &mut rest[..n];

            // running_max tracks max over k < j of prev_row[k] + GAP_PENALTY*(k+1),
            // so subtracting GAP_PENALTY*j yields the gap-penalized predecessor.
            let mut running_max = MIN_SCORE;
            let mut running_arg = -1i32;
            for (j, &c) in candidate.iter().enumerate() {
                if j > 0 {
                    let prev = prev_row[j - 1];
                    if prev > MIN_SCORE / 2 {
                        let v = prev + GAP_PENALTY * (j as i32);
                        if v > running_max {
                            running_max = v;
                            running_arg = (j - 1) as i32;
                        }
                    }
                }

                if fold(c) != q_folded {
                    continue;
                }

                let gapped = if running_max > MIN_SCORE / 2 {
                    running_max - GAP_PENALTY * (j as i32)
                } else {
                    MIN_SCORE
                };
                let consecutive = if j > 0 {
                    prev_row[j - 1] + BONUS_CONSECUTIVE
                } else {
                    MIN_SCORE
                };

                // Prefer the contiguous run when the scores tie so spans stay compact.
                let (prev_best, parent) = if consecutive >= gapped {
                    (consecutive, j as i32 - 1)
                } else {
                    (gapped, running_arg)
                };
                if prev_best <= MIN_SCORE / 2 {
                    continue;
                }

                let mut score = prev_best + BASE_MATCH;
                if self.word_starts[j] {
                    score += BONUS_WORD_START;
                }
                score += case_bonus(q, c);
                cur_row[j] = score;
                self.parents[i * n + j] = parent;
            }
        }

        let last_row = &self.scores[(m - 1) * n..];
        let mut best = MIN_SCORE;
        let mut best_j = None;
        for (j, &score) in last_row.iter().enumerate() {
            if score <= MIN_SCORE / 2 {
                continue;
            }
            let trailing = (n - 1 - j) as i32;
            let adjusted = score - TRAILING_PENALTY * trailing;
            if adjusted > best {
                best = adjusted;
                best_j = Some(j);
            }
        }
        let mut j = best_j?;

        let mut positions = vec![0usize; m];
        for i in (0..m).rev() {
            positions[i] = j;
            if i > 0 {
                j = self.parents[i * n + j] as usize;
            }
        }

        let case_sensitive = positions
            .iter()
            .zip(self.query.iter())
            .all(|(&p, &q)| candidate[p] == q);

        Some(PatternMatch {
            kind: MatchKind::Fuzzy,
            score: best,
            case_sensitive,
            spans: coalesce_spans(&positions),
        })
    }
}

/// Fuzzy match `query` against `candidate`.
///
/// - ASCII case-insensitive.
/// - Prefix matches are fast-pathed and always rank above fuzzy matches.
pub fn fuzzy_match(query: &str, candidate: &str) -> Option<PatternMatch> {
    FuzzyMatcher::new(query).score(candidate)
}
