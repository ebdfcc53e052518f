use std::collections::HashSet;

use crate::{
    constants::MAX_NAME_LENGTH,
    media::{ImageSource, RecipeImage},
    schema::{IngredientAmount, RecipeRecord, Uuid},
    RecipeError,
};

/// Recipe payload as submitted by the client, before any checks.
#[derive(Debug, Clone, Default)]
pub struct RecipeDraft {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<ImageSource>,
}

#[derive(Debug, Clone)]
pub struct ValidRecipe {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<RecipeImage>,
}

impl ValidRecipe {
    pub fn into_record(self, image: Option<String>) -> RecipeRecord {
        RecipeRecord {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image,
            tags: self.tags,
            ingredients: self.ingredients,
        }
    }
}

/// Collection emptiness is checked before anything else so an empty tag or
/// ingredient list is always reported as such.
pub fn validate_recipe(draft: RecipeDraft) -> Result<ValidRecipe, RecipeError> {
    if draft.tags.is_empty() {
        return Err(RecipeError::EmptyCollection("tags"));
    }
    if draft.ingredients.is_empty() {
        return Err(RecipeError::EmptyCollection("ingredients"));
    }

    let mut seen = HashSet::new();
    for ingredient in &draft.ingredients {
        if !seen.insert(ingredient.id) {
            return Err(RecipeError::DuplicateIngredient(ingredient.id));
        }
        if ingredient.amount <= 0 {
            return Err(RecipeError::NonPositiveValue("amount"));
        }
    }

    if draft.cooking_time <= 0 {
        return Err(RecipeError::NonPositiveValue("cooking_time"));
    }

    let name = draft.name.trim().to_string();
    if name.is_empty() {
        return Err(RecipeError::InvalidInput(String::from(
            "Field `name` must not be blank",
        )));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(RecipeError::InvalidInput(format!(
            "Field `name` must be at most {MAX_NAME_LENGTH} characters"
        )));
    }

    let image = draft.image.map(RecipeImage::try_from).transpose()?;

    // tags are a set
    let mut tags = Vec::with_capacity(draft.tags.len());
    for tag in draft.tags {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(ValidRecipe {
        tags,
        ingredients: draft.ingredients,
        name,
        text: draft.text,
        cooking_time: draft.cooking_time,
        image,
    })
}

pub fn validate_follow(
    user_id: Uuid,
    author_id: Uuid,
    already_following: bool,
) -> Result<(), RecipeError> {
    if user_id == author_id {
        return Err(RecipeError::SelfFollow);
    }
    if already_following {
        return Err(RecipeError::DuplicateFollow);
    }
    Ok(())
}
