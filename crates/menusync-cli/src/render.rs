//! Plain-text rendering of synced data.

use menusync_core::models::{group_by_category, InfoPage, Menu};

/// Column width for dish names
const NAME_WIDTH: usize = 40;

pub fn print_menu(menu: &Menu) {
    if menu.is_empty() {
        println!("Nothing on the menu today.");
        return;
    }

    for (category, dishes) in group_by_category(menu) {
        println!("{}", category);
        for dish in dishes {
            let allergens = if dish.allergens.is_empty() {
                String::new()
            } else {
                format!("  [{}]", dish.allergens_display())
            };
            println!(
                "  {:<width$} {:>7} {:>7} {:>7}{}",
                truncate(&dish.name, NAME_WIDTH),
                dish.prices.student_display(),
                dish.prices.staff_display(),
                dish.prices.public_display(),
                allergens,
                width = NAME_WIDTH,
            );
        }
        println!();
    }
}

pub fn print_info(pages: &Vec<InfoPage>) {
    if pages.is_empty() {
        println!("No info pages.");
        return;
    }

    for page in pages {
        println!("== {} ==", page.title);
        println!("{}", page.body.trim());
        println!();
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
