//! Myers shortest-edit diff
//!
//! Computes the minimal edit script between two sequences by exploring edit
//! distance frontiers (the classic O((N+M)D) greedy algorithm): a forward
//! pass records the furthest-reaching x for every diagonal at each distance,
//! and a backtrack pass walks the trace into concrete edits.

use derive_new::new;

type Lines<T> = Vec<Line<T>>;

/// A sequence element with its 1-based position
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Line<T> {
    pub number: usize,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<T> {
    Delete { line: Line<T> },
    Insert { line: Line<T> },
    Equal { line_a: Line<T>, line_b: Line<T> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyersDiff<T> {
    a: Lines<T>,
    b: Lines<T>,
}

impl<T: Eq + Clone> MyersDiff<T> {
    pub fn new(a: &[T], b: &[T]) -> Self {
        MyersDiff {
            a: Self::lines(a),
            b: Self::lines(b),
        }
    }

    fn lines(document: &[T]) -> Lines<T> {
        document
            .iter()
            .enumerate()
            .map(|(i, value)| Line::new(i + 1, value.clone()))
            .collect()
    }

    /// Snapshot of the furthest-reaching frontier per edit distance
    fn compute_shortest_edit(&self) -> Vec<Vec<isize>> {
        let (n, m) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (n + m) as usize;

        let mut v = vec![0isize; 2 * offset + 1];
        let mut trace = Vec::new();

        for d in 0..=(n + m) {
            trace.push(v.clone());

            for k in (-d..=d).step_by(2) {
                let idx = (offset as isize + k) as usize;

                let mut x = if k == -d {
                    // only reachable from k+1, an insertion
                    v[idx + 1]
                } else if k == d {
                    // only reachable from k-1, a deletion
                    v[idx - 1] + 1
                } else {
                    let x_del = v[idx - 1] + 1;
                    let x_ins = v[idx + 1];
                    x_del.max(x_ins)
                };

                let mut y = x - k;
                while x < n && y < m && self.a[x as usize].value == self.b[y as usize].value {
                    // snake along the diagonal
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return trace;
                }
            }
        }

        trace
    }

    fn backtrack(&self) -> Vec<(isize, isize, isize, isize)> {
        let (mut x, mut y) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (x + y) as usize;
        let mut edit_path = Vec::new();

        let trace = self.compute_shortest_edit();

        for (d, v) in trace.iter().enumerate().rev() {
            let k = x - y;

            let prev_k = if k == -(d as isize) {
                k + 1
            } else if k == (d as isize) {
                k - 1
            } else {
                let k_del = k - 1;
                let k_ins = k + 1;
                if v[(offset as isize + k_del) as usize] + 1
                    > v[(offset as isize + k_ins) as usize]
                {
                    k_del
                } else {
                    k_ins
                }
            };

            let prev_x = v[(offset as isize + prev_k) as usize];
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                edit_path.push((x - 1, y - 1, x, y));
                x -= 1;
                y -= 1;
            }

            if d > 0 {
                edit_path.push((prev_x, prev_y, x, y));
            }

            (x, y) = (prev_x, prev_y);
        }

        edit_path
    }

    /// The full edit script, in order
    pub fn diff(&self) -> Vec<Edit<T>> {
        if self.a.is_empty() && self.b.is_empty() {
            return Vec::new();
        }

        let mut diff = Vec::new();

        for (prev_x, prev_y, x, y) in self.backtrack() {
            if x == prev_x {
                // only y advanced: insertion
                if prev_y < self.b.len() as isize {
                    diff.push(Edit::Insert {
                        line: self.b[prev_y as usize].clone(),
                    });
                }
            } else if y == prev_y {
                // only x advanced: deletion
                if prev_x < self.a.len() as isize {
                    diff.push(Edit::Delete {
                        line: self.a[prev_x as usize].clone(),
                    });
                }
            } else if prev_x < self.a.len() as isize {
                diff.push(Edit::Equal {
                    line_a: self.a[prev_x as usize].clone(),
                    line_b: self.b[prev_y as usize].clone(),
                });
            }
        }

        diff.reverse();
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_diff_of_modified_file() {
        let a = vec!["line1", "line2", "line3", "line4"];
        let b = vec!["line2", "line3_modified", "line4", "line5"];

        let script = MyersDiff::new(&a, &b).diff();

        let rendered: Vec<String> = script
            .iter()
            .map(|edit| match edit {
                Edit::Delete { line } => format!("-{}", line.value),
                Edit::Insert { line } => format!("+{}", line.value),
                Edit::Equal { line_a, .. } => format!(" {}", line_a.value),
            })
            .collect();

        assert_eq!(
            rendered,
            vec!["-line1", " line2", "-line3", "+line3_modified", " line4", "+line5"]
        );
    }

    #[rstest]
    fn test_equal_edits_keep_both_line_numbers() {
        let a = vec!["shared"];
        let b = vec!["inserted", "shared"];

        let script = MyersDiff::new(&a, &b).diff();
        let equal = script
            .iter()
            .find_map(|edit| match edit {
                Edit::Equal { line_a, line_b } => Some((line_a.number, line_b.number)),
                _ => None,
            })
            .unwrap();

        assert_eq!(equal, (1, 2));
    }

    #[rstest]
    fn test_identical_inputs_produce_only_equals() {
        let a = vec!["x", "y"];
        let script = MyersDiff::new(&a, &a).diff();

        assert!(script.iter().all(|edit| matches!(edit, Edit::Equal { .. })));
        assert_eq!(script.len(), 2);
    }

    #[rstest]
    fn test_empty_inputs() {
        let script = MyersDiff::<&str>::new(&[], &[]).diff();
        assert!(script.is_empty());

        let script = MyersDiff::new(&[], &["new"]).diff();
        assert_eq!(script.len(), 1);
        assert!(matches!(script[0], Edit::Insert { .. }));
    }
}
