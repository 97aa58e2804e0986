use std::iter;

/// Expand tabs to the next multiple of `tab_stops` columns.
pub(crate) fn fix_tab_stops(s: &str, tab_stops: usize) -> String {
    let tab_stops = tab_stops.max(1);
    let mut out = String::with_capacity(s.len());
    let mut column = 0;
    for c in s.chars() {
        match c {
            '\t' => {
                let width = tab_stops - column % tab_stops;
                out.extend(iter::repeat_n(' ', width));
                column += width;
            }
            '\n' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_align_to_stops() {
        assert_eq!(fix_tab_stops("\tx", 4), "    x");
        assert_eq!(fix_tab_stops("ab\tx", 4), "ab  x");
        assert_eq!(fix_tab_stops("abcd\tx\n\ty", 4), "abcd    x\n    y");
    }
}
