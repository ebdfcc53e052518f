use std::fmt::Write;

use super::aggregation::aggregate_shopping_list;
use crate::{
    constants::SHOPPING_LIST_HEADER, context::RequestContext, schema::ShoppingListItem,
    store::RecipeStore, RecipeError,
};

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = format!("{SHOPPING_LIST_HEADER}\n");
    for item in items {
        // writing into a String can't fail
        let _ = writeln!(
            text,
            "{} - {} ({})",
            item.name, item.amount, item.measurement_unit
        );
    }
    text
}

/// Plain-text shopping list of the requester's cart.
pub async fn download_shopping_list<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
) -> Result<String, RecipeError> {
    let session = ctx.require_user()?;
    let items = aggregate_shopping_list(store, session.user_id).await?;
    log::info!(
        "{} downloaded a shopping list of {} items",
        session.username,
        items.len()
    );

    Ok(render_shopping_list(&items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, amount: i64, unit: &str) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn renders_one_line_per_item() {
        let text = render_shopping_list(&[item("Flour", 500, "g"), item("Milk", 2, "l")]);
        assert_eq!(text, "Shopping list:\nFlour - 500 (g)\nMilk - 2 (l)\n");
    }

    #[test]
    fn empty_cart_renders_header_only() {
        assert_eq!(render_shopping_list(&[]), "Shopping list:\n");
    }
}
