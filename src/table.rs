use pad::PadStr;

/// Plain bordered table for terminal listings.
pub struct Table {
    ncol: usize,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(titles: &[&str]) -> Table {
        Table {
            ncol: titles.len(),
            rows: vec![titles.iter().map(|s| s.to_string()).collect()],
        }
    }

    /// Rows shorter than the title row are padded with empty cells, longer
    /// rows are cut.
    pub fn add(&mut self, mut row: Vec<String>) {
        row.resize(self.ncol, String::new());
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut pads = vec![0; self.ncol];
        for row in self.rows.iter() {
            for (coli, cell) in row.iter().enumerate() {
                let size = console::measure_text_width(cell);
                if size > pads[coli] {
                    pads[coli] = size;
                }
            }
        }

        let mut split = String::from("+");
        for pad in pads.iter() {
            split.push_str(&"-".repeat(*pad + 2));
            split.push('+');
        }

        let mut out = String::new();
        out.push_str(&split);
        out.push('\n');
        for (rowi, row) in self.rows.iter().enumerate() {
            out.push('|');
            for (coli, cell) in row.iter().enumerate() {
                let text = cell.pad_to_width_with_alignment(pads[coli], pad::Alignment::Left);
                out.push_str(&format!(" {text} |"));
            }
            out.push('\n');

            if rowi == 0 {
                out.push_str(&split);
                out.push('\n');
            }
        }
        if self.rows.len() > 1 {
            out.push_str(&split);
            out.push('\n');
        }
        out
    }

    pub fn show(&self) {
        print!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut table = Table::new(&["Name", "Status"]);
        table.add(vec![String::from("analytics"), String::from("active")]);
        table.add(vec![String::from("web")]);

        let expect = "\
+-----------+--------+
| Name      | Status |
+-----------+--------+
| analytics | active |
| web       |        |
+-----------+--------+
";
        assert_eq!(table.render(), expect);
    }
}
