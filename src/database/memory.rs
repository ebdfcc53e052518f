use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::store::RecipeStore;
use crate::{
    schema::{
        EntryKind, Ingredient, Recipe, RecipeFilter, RecipeIngredient, RecipeRecord,
        ShoppingListItem, Tag, User, UserRole, Uuid,
    },
    RecipeError,
};

#[derive(Default)]
struct Tables {
    sequence: Uuid,
    users: BTreeMap<Uuid, User>,
    tags: BTreeMap<Uuid, Tag>,
    ingredients: BTreeMap<Uuid, Ingredient>,
    recipes: BTreeMap<Uuid, Recipe>,
    recipe_tags: BTreeSet<(Uuid, Uuid)>,
    recipe_ingredients: BTreeMap<(Uuid, Uuid), i32>,
    favorites: BTreeSet<(Uuid, Uuid)>,
    shopping_cart: BTreeSet<(Uuid, Uuid)>,
    /// (user, author) in subscription order
    follows: Vec<(Uuid, Uuid)>,
}

impl Tables {
    fn next_id(&mut self) -> Uuid {
        self.sequence += 1;
        self.sequence
    }

    fn entries(&self, kind: EntryKind) -> &BTreeSet<(Uuid, Uuid)> {
        match kind {
            EntryKind::Favorite => &self.favorites,
            EntryKind::ShoppingCart => &self.shopping_cart,
        }
    }

    fn entries_mut(&mut self, kind: EntryKind) -> &mut BTreeSet<(Uuid, Uuid)> {
        match kind {
            EntryKind::Favorite => &mut self.favorites,
            EntryKind::ShoppingCart => &mut self.shopping_cart,
        }
    }

    /// Same guarantees the foreign keys and unique constraints give in Postgres.
    fn check_record(&self, record: &RecipeRecord) -> Result<(), RecipeError> {
        if let Some(tag) = record.tags.iter().find(|id| !self.tags.contains_key(id)) {
            return Err(RecipeError::not_found("Tag", *tag));
        }

        let mut seen = BTreeSet::new();
        for ingredient in &record.ingredients {
            if !self.ingredients.contains_key(&ingredient.id) {
                return Err(RecipeError::not_found("Ingredient", ingredient.id));
            }
            if !seen.insert(ingredient.id) {
                return Err(RecipeError::DuplicateIngredient(ingredient.id));
            }
            if ingredient.amount <= 0 {
                return Err(RecipeError::NonPositiveValue("amount"));
            }
        }

        if record.cooking_time <= 0 {
            return Err(RecipeError::NonPositiveValue("cooking_time"));
        }
        Ok(())
    }

    fn clear_associations(&mut self, recipe_id: Uuid) {
        self.recipe_tags.retain(|(recipe, _)| *recipe != recipe_id);
        self.recipe_ingredients
            .retain(|(recipe, _), _| *recipe != recipe_id);
    }

    fn write_associations(&mut self, recipe_id: Uuid, record: &RecipeRecord) {
        for tag in &record.tags {
            self.recipe_tags.insert((recipe_id, *tag));
        }
        for ingredient in &record.ingredients {
            self.recipe_ingredients
                .insert((recipe_id, ingredient.id), ingredient.amount);
        }
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter) -> bool {
        if filter.author.is_some_and(|author| author != recipe.author_id) {
            return false;
        }
        if !filter.tags.is_empty() {
            let tagged = self
                .recipe_tags
                .iter()
                .filter(|(recipe_id, _)| *recipe_id == recipe.id)
                .filter_map(|(_, tag_id)| self.tags.get(tag_id))
                .any(|tag| filter.tags.contains(&tag.slug));
            if !tagged {
                return false;
            }
        }
        if let Some(user_id) = filter.favorited_by {
            if !self.favorites.contains(&(user_id, recipe.id)) {
                return false;
            }
        }
        if let Some(user_id) = filter.in_cart_of {
            if !self.shopping_cart.contains(&(user_id, recipe.id)) {
                return false;
            }
        }
        true
    }

    fn newest_first<'a>(&'a self, recipes: impl Iterator<Item = &'a Recipe>) -> Vec<Recipe> {
        let mut list: Vec<Recipe> = recipes.cloned().collect();
        list.sort_by(|a, b| (b.pub_date, b.id).cmp(&(a.pub_date, a.id)));
        list
    }
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let rows = rows
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    (rows, total)
}

/// In-process store for tests and local development. Every operation holds
/// the table lock from first read to last write, which makes it atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, username: &str, role: UserRole) -> User {
        let mut tables = self.tables.lock().await;
        let user = User {
            id: tables.next_id(),
            email: format!("{username}@foodgram.local"),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: String::new(),
            role,
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    pub async fn insert_tag(&self, name: &str, color: &str, slug: &str) -> Tag {
        let mut tables = self.tables.lock().await;
        let tag = Tag {
            id: tables.next_id(),
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        };
        tables.tags.insert(tag.id, tag.clone());
        tag
    }

    pub async fn insert_ingredient(&self, name: &str, measurement_unit: &str) -> Ingredient {
        let mut tables = self.tables.lock().await;
        let ingredient = Ingredient {
            id: tables.next_id(),
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        };
        tables.ingredients.insert(ingredient.id, ingredient.clone());
        ingredient
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RecipeError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), RecipeError> {
        let tables = self.tables.lock().await;
        Ok(page(tables.users.values().cloned().collect(), limit, offset))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, RecipeError> {
        Ok(self.tables.lock().await.tags.values().cloned().collect())
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, RecipeError> {
        Ok(self.tables.lock().await.tags.get(&id).cloned())
    }

    async fn search_ingredients(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<Ingredient>, RecipeError> {
        let tables = self.tables.lock().await;
        let prefix = prefix.map(str::to_lowercase);
        let mut list: Vec<Ingredient> = tables
            .ingredients
            .values()
            .filter(|ingredient| match &prefix {
                Some(prefix) => ingredient.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(list)
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, RecipeError> {
        Ok(self.tables.lock().await.ingredients.get(&id).cloned())
    }

    async fn insert_recipe(
        &self,
        author_id: Uuid,
        record: &RecipeRecord,
    ) -> Result<Uuid, RecipeError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&author_id) {
            return Err(RecipeError::not_found("User", author_id));
        }
        let image = record
            .image
            .clone()
            .ok_or_else(|| RecipeError::InvalidInput(String::from("Field `image` is required")))?;
        tables.check_record(record)?;

        let id = tables.next_id();
        tables.recipes.insert(
            id,
            Recipe {
                id,
                author_id,
                name: record.name.to_owned(),
                image,
                text: record.text.to_owned(),
                cooking_time: record.cooking_time,
                pub_date: Utc::now(),
            },
        );
        tables.write_associations(id, record);

        Ok(id)
    }

    async fn replace_recipe(&self, id: Uuid, record: &RecipeRecord) -> Result<(), RecipeError> {
        let mut tables = self.tables.lock().await;
        if !tables.recipes.contains_key(&id) {
            return Err(RecipeError::not_found("Recipe", id));
        }
        tables.check_record(record)?;

        if let Some(recipe) = tables.recipes.get_mut(&id) {
            recipe.name = record.name.to_owned();
            recipe.text = record.text.to_owned();
            recipe.cooking_time = record.cooking_time;
            if let Some(image) = &record.image {
                recipe.image = image.to_owned();
            }
        }
        tables.clear_associations(id);
        tables.write_associations(id, record);

        Ok(())
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, RecipeError> {
        let mut tables = self.tables.lock().await;
        if tables.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.clear_associations(id);
        tables.favorites.retain(|(_, recipe)| *recipe != id);
        tables.shopping_cart.retain(|(_, recipe)| *recipe != id);

        Ok(true)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, RecipeError> {
        Ok(self.tables.lock().await.recipes.get(&id).cloned())
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), RecipeError> {
        let tables = self.tables.lock().await;
        let list = tables.newest_first(
            tables
                .recipes
                .values()
                .filter(|recipe| tables.matches(recipe, filter)),
        );
        Ok(page(list, limit, offset))
    }

    async fn list_author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, RecipeError> {
        let tables = self.tables.lock().await;
        let mut list = tables.newest_first(
            tables
                .recipes
                .values()
                .filter(|recipe| recipe.author_id == author_id),
        );
        if let Some(limit) = limit {
            list.truncate(limit.max(0) as usize);
        }
        Ok(list)
    }

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, RecipeError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .recipes
            .values()
            .filter(|recipe| recipe.author_id == author_id)
            .count() as i64)
    }

    async fn list_recipe_tags(&self, recipe_id: Uuid) -> Result<Vec<Tag>, RecipeError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .recipe_tags
            .iter()
            .filter(|(recipe, _)| *recipe == recipe_id)
            .filter_map(|(_, tag)| tables.tags.get(tag).cloned())
            .collect())
    }

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Uuid,
    ) -> Result<Vec<RecipeIngredient>, RecipeError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<RecipeIngredient> = tables
            .recipe_ingredients
            .iter()
            .filter(|((recipe, _), _)| *recipe == recipe_id)
            .filter_map(|((_, ingredient_id), amount)| {
                tables
                    .ingredients
                    .get(ingredient_id)
                    .map(|ingredient| RecipeIngredient {
                        id: ingredient.id,
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: *amount,
                    })
            })
            .collect();
        rows.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(rows)
    }

    async fn has_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let tables = self.tables.lock().await;
        Ok(tables.entries(kind).contains(&(user_id, recipe_id)))
    }

    async fn add_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let mut tables = self.tables.lock().await;
        if !tables.recipes.contains_key(&recipe_id) {
            return Err(RecipeError::not_found("Recipe", recipe_id));
        }
        Ok(tables.entries_mut(kind).insert((user_id, recipe_id)))
    }

    async fn remove_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.entries_mut(kind).remove(&(user_id, recipe_id)))
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let tables = self.tables.lock().await;
        Ok(tables.follows.contains(&(user_id, author_id)))
    }

    async fn add_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let mut tables = self.tables.lock().await;
        if user_id == author_id {
            return Err(RecipeError::SelfFollow);
        }
        if tables.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn remove_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let mut tables = self.tables.lock().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|follow| *follow != (user_id, author_id));
        Ok(tables.follows.len() < before)
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), RecipeError> {
        let tables = self.tables.lock().await;
        let authors: Vec<User> = tables
            .follows
            .iter()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, author)| tables.users.get(author).cloned())
            .collect();
        Ok(page(authors, limit, offset))
    }

    async fn aggregate_shopping_list(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ShoppingListItem>, RecipeError> {
        let tables = self.tables.lock().await;
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

        for (_, recipe_id) in tables
            .shopping_cart
            .iter()
            .filter(|(user, _)| *user == user_id)
        {
            for ((_, ingredient_id), amount) in tables
                .recipe_ingredients
                .range((*recipe_id, Uuid::MIN)..=(*recipe_id, Uuid::MAX))
            {
                if let Some(ingredient) = tables.ingredients.get(ingredient_id) {
                    *totals
                        .entry((
                            ingredient.name.to_owned(),
                            ingredient.measurement_unit.to_owned(),
                        ))
                        .or_default() += i64::from(*amount);
                }
            }
        }

        Ok(totals
            .into_iter()
            .map(|((name, measurement_unit), amount)| ShoppingListItem {
                name,
                measurement_unit,
                amount,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IngredientAmount;

    fn record(tags: Vec<Uuid>, ingredients: Vec<(Uuid, i32)>) -> RecipeRecord {
        RecipeRecord {
            name: String::from("Soup"),
            text: String::from("Boil everything"),
            cooking_time: 30,
            image: Some(String::from("recipes/soup.png")),
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
        }
    }

    #[tokio::test]
    async fn rejects_unknown_references_without_writing() {
        let store = MemoryStore::new();
        let author = store.insert_user("cook", UserRole::User).await;
        let tag = store.insert_tag("Lunch", "#00FF00", "lunch").await;

        let result = store
            .insert_recipe(author.id, &record(vec![tag.id], vec![(999, 1)]))
            .await;
        assert_eq!(result, Err(RecipeError::not_found("Ingredient", 999)));

        let (recipes, count) = store
            .list_recipes(&RecipeFilter::default(), 10, 0)
            .await
            .unwrap();
        assert!(recipes.is_empty());
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn delete_cascades_to_entries_and_associations() {
        let store = MemoryStore::new();
        let author = store.insert_user("cook", UserRole::User).await;
        let tag = store.insert_tag("Lunch", "#00FF00", "lunch").await;
        let salt = store.insert_ingredient("Salt", "g").await;

        let id = store
            .insert_recipe(author.id, &record(vec![tag.id], vec![(salt.id, 2)]))
            .await
            .unwrap();
        store
            .add_entry(EntryKind::ShoppingCart, author.id, id)
            .await
            .unwrap();

        assert!(store.delete_recipe(id).await.unwrap());
        assert!(store.list_recipe_ingredients(id).await.unwrap().is_empty());
        assert!(store.list_recipe_tags(id).await.unwrap().is_empty());
        assert!(!store
            .has_entry(EntryKind::ShoppingCart, author.id, id)
            .await
            .unwrap());
        assert_eq!(store.list_tags().await.unwrap(), vec![tag]);
        assert_eq!(store.get_ingredient(salt.id).await.unwrap(), Some(salt));
    }

    #[tokio::test]
    async fn searches_ingredients_by_prefix() {
        let store = MemoryStore::new();
        store.insert_ingredient("Sugar", "g").await;
        store.insert_ingredient("salt", "g").await;
        store.insert_ingredient("Pepper", "g").await;

        let names: Vec<String> = store
            .search_ingredients(Some("S"))
            .await
            .unwrap()
            .into_iter()
            .map(|ingredient| ingredient.name)
            .collect();
        assert_eq!(names, vec!["Sugar", "salt"]);
        assert_eq!(store.search_ingredients(None).await.unwrap().len(), 3);
    }
}
