/// Decide which slots make it into a render pass.
///
/// Pinned and anchored rows are always kept. While the total exceeds
/// `limit`, floating slots are dropped from the top of the floating region
/// down. The result may still exceed `limit` once no floating rows remain.
pub(crate) fn fit(rows: &[usize], floating: &[bool], limit: Option<usize>) -> Vec<bool> {
    let mut included = vec![true; rows.len()];
    let Some(limit) = limit else {
        return included;
    };

    let mut total: usize = rows.iter().sum();
    for (idx, (&height, &is_floating)) in rows.iter().zip(floating).enumerate() {
        if total <= limit {
            break;
        }
        if !is_floating || height == 0 {
            continue;
        }
        included[idx] = false;
        total -= height;
    }
    included
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_keeps_everything() {
        assert_eq!(fit(&[5, 5], &[true, true], None), vec![true, true]);
    }

    #[test]
    fn drops_oldest_floating_first() {
        // header, a, b, c, prompt
        let rows = [1, 1, 1, 1, 1];
        let floating = [false, true, true, true, false];
        assert_eq!(
            fit(&rows, &floating, Some(4)),
            vec![true, false, true, true, true]
        );
    }

    #[test]
    fn fixed_rows_are_never_sacrificed() {
        let rows = [3, 1, 3];
        let floating = [false, true, false];
        assert_eq!(fit(&rows, &floating, Some(2)), vec![true, false, true]);
    }

    #[test]
    fn tall_floating_block_is_dropped_whole() {
        let rows = [1, 4, 1, 1];
        let floating = [false, true, true, false];
        assert_eq!(
            fit(&rows, &floating, Some(3)),
            vec![true, false, true, true]
        );
    }
}
