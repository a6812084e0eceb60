use anyhow::Result;
use serde::Serialize;

use crate::table::Table;

pub trait TerminalDisplay {
    fn table_titles() -> Vec<&'static str>;
    fn table_row(self) -> Vec<String>;
}

pub fn display_json<T: Serialize>(o: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&o)?);
    Ok(())
}

pub fn display_list<T: Serialize + TerminalDisplay>(list: Vec<T>, json: bool) -> Result<()> {
    if json {
        return display_json(list);
    }

    if list.is_empty() {
        println!("<empty list>");
        return Ok(());
    }

    let mut table = Table::new(&T::table_titles());
    for item in list {
        table.add(item.table_row());
    }
    table.show();
    Ok(())
}
