use std::collections::HashMap;

use futures_util::TryStreamExt;
use serde_json::Value;
use warp::{multipart::Part, Buf};

use super::{error::TypeError, validation::RecipeDraft};
use crate::{
    media::ImageSource,
    schema::{IngredientAmount, Uuid},
};

pub type FormData = HashMap<String, Value>;

/// Loosely typed request body. Numbers may arrive as JSON numbers or numeric strings.
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    fn get(&self, key: &str) -> Result<&Value, TypeError> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Err(TypeError::new(&format!("Field `{key}` is required"))),
            Some(value) => Ok(value),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: TryFrom<i64>,
    {
        as_number(self.get(key)?, key)
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.get(key)?.as_str() {
            Some(v) => Ok(v.to_string()),
            None => Err(TypeError::new(&format!("Field `{key}` must be a string"))),
        }
    }

    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, TypeError> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Ok(None),
            Some(_) => self.get_str(key).map(Some),
        }
    }

    pub fn get_id_list(&self, key: &str) -> Result<Vec<Uuid>, TypeError> {
        self.get_list(key)?
            .iter()
            .map(|value| as_number(value, key))
            .collect()
    }

    pub fn get_ingredient_list(&self, key: &str) -> Result<Vec<IngredientAmount>, TypeError> {
        self.get_list(key)?
            .iter()
            .map(|value| match value.as_object() {
                Some(object) => {
                    let id = object
                        .get("id")
                        .ok_or_else(|| TypeError::new("Ingredient `id` is required"))?;
                    let amount = object
                        .get("amount")
                        .ok_or_else(|| TypeError::new("Ingredient `amount` is required"))?;

                    Ok(IngredientAmount {
                        id: as_number(id, "id")?,
                        amount: as_number(amount, "amount")?,
                    })
                }
                None => Err(TypeError::new(&format!(
                    "Field `{key}` must contain objects"
                ))),
            })
            .collect()
    }

    fn get_list(&self, key: &str) -> Result<&Vec<Value>, TypeError> {
        match self.get(key)?.as_array() {
            Some(list) => Ok(list),
            None => Err(TypeError::new(&format!("Field `{key}` must be a list"))),
        }
    }
}

fn as_number<T>(value: &Value, key: &str) -> Result<T, TypeError>
where
    T: TryFrom<i64>,
{
    let number = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    number
        .and_then(|number| T::try_from(number).ok())
        .ok_or_else(|| TypeError::new(&format!("Field `{key}` must be an integer")))
}

impl TryFrom<Form> for RecipeDraft {
    type Error = TypeError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: form.get_id_list("tags")?,
            ingredients: form.get_ingredient_list("ingredients")?,
            name: form.get_str("name")?,
            text: form.get_str("text")?,
            cooking_time: form.get_number("cooking_time")?,
            image: form
                .get_optional_str("image")?
                .map(ImageSource::DataUri),
        })
    }
}

async fn read_part(part: &mut Part) -> Result<Vec<u8>, TypeError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = part.data().await {
        let chunk = chunk.map_err(|e| TypeError::new(&format!("Invalid multipart body: {e}")))?;
        bytes.extend_from_slice(chunk.chunk());
    }
    Ok(bytes)
}

/// Reads a `multipart/form-data` recipe. Text parts land in the same [`FormData`]
/// a JSON body would produce: `tags` may repeat and `ingredients` holds a JSON list.
/// A part named `image` that carries a file name is taken as the uploaded image.
pub async fn read_multipart(
    data: warp::multipart::FormData,
) -> Result<RecipeDraft, TypeError> {
    let mut parts = Box::pin(data);
    let mut fields = FormData::new();
    let mut tags = Vec::new();
    let mut upload = None;

    while let Some(mut part) = parts
        .try_next()
        .await
        .map_err(|e| TypeError::new(&format!("Invalid multipart body: {e}")))?
    {
        let name = part.name().to_string();
        let content_type = part.content_type().map(str::to_owned);
        let filename = part.filename().map(str::to_owned);
        let bytes = read_part(&mut part).await?;

        if name == "image" && filename.is_some() {
            upload = Some(ImageSource::Upload {
                content_type,
                filename,
                bytes,
            });
            continue;
        }

        let text = String::from_utf8(bytes)
            .map_err(|_e| TypeError::new(&format!("Field `{name}` must be text")))?;
        match name.as_str() {
            "tags" => tags.push(Value::String(text)),
            "ingredients" => {
                let list = serde_json::from_str(&text).map_err(|_e| {
                    TypeError::new("Field `ingredients` must be a JSON list")
                })?;
                fields.insert(name, list);
            }
            _ => {
                fields.insert(name, Value::String(text));
            }
        }
    }

    if !tags.is_empty() {
        fields.insert(String::from("tags"), Value::Array(tags));
    }

    let mut draft = RecipeDraft::try_from(Form::from_data(fields))?;
    if upload.is_some() {
        draft.image = upload;
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(value: Value) -> Form {
        Form::from_data(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn parses_recipe_payload() {
        let draft = RecipeDraft::try_from(form(json!({
            "tags": [1, "2"],
            "ingredients": [{"id": 5, "amount": "10"}, {"id": 6, "amount": 1}],
            "name": "Borscht",
            "text": "Boil",
            "cooking_time": 90,
            "image": "data:image/png;base64,aGVsbG8=",
        })))
        .unwrap();

        assert_eq!(draft.tags, vec![1, 2]);
        assert_eq!(
            draft.ingredients,
            vec![
                IngredientAmount { id: 5, amount: 10 },
                IngredientAmount { id: 6, amount: 1 },
            ]
        );
        assert_eq!(draft.cooking_time, 90);
        assert!(draft.image.is_some());
    }

    #[test]
    fn image_is_optional() {
        let draft = RecipeDraft::try_from(form(json!({
            "tags": [1],
            "ingredients": [{"id": 5, "amount": 1}],
            "name": "Tea",
            "text": "Steep",
            "cooking_time": "5",
            "image": null,
        })))
        .unwrap();

        assert_eq!(draft.cooking_time, 5);
        assert!(draft.image.is_none());
    }

    #[test]
    fn rejects_wrong_types() {
        let result = RecipeDraft::try_from(form(json!({
            "tags": "1",
            "ingredients": [],
            "name": "Tea",
            "text": "Steep",
            "cooking_time": 5,
        })));
        assert!(result.is_err());

        let result = RecipeDraft::try_from(form(json!({
            "tags": [1],
            "ingredients": [{"id": 1, "amount": 1.5}],
            "name": "Tea",
            "text": "Steep",
            "cooking_time": 5,
        })));
        assert!(result.is_err());

        let result = RecipeDraft::try_from(form(json!({
            "tags": [1],
            "ingredients": [],
            "text": "Steep",
            "cooking_time": 5,
        })));
        assert_eq!(result.unwrap_err().to_string(), "Field `name` is required");
    }

    #[test]
    fn rejects_overflowing_numbers() {
        let result = form(json!({ "cooking_time": 4_000_000_000i64 })).get_number::<i32>("cooking_time");
        assert!(result.is_err());
    }

    const BOUNDARY: &str = "recipe-boundary";

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    async fn multipart(body: String) -> warp::multipart::FormData {
        warp::test::request()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .filter(&warp::multipart::form())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reads_multipart_recipe_with_upload() {
        let body = [
            text_part("name", "Borscht"),
            text_part("text", "Boil"),
            text_part("cooking_time", "90"),
            text_part("tags", "1"),
            text_part("tags", "2"),
            text_part("ingredients", r#"[{"id": 5, "amount": 10}]"#),
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"soup.png\"\r\nContent-Type: image/png\r\n\r\nhello\r\n"
            ),
            format!("--{BOUNDARY}--\r\n"),
        ]
        .concat();

        let draft = read_multipart(multipart(body).await).await.unwrap();
        assert_eq!(draft.name, "Borscht");
        assert_eq!(draft.cooking_time, 90);
        assert_eq!(draft.tags, vec![1, 2]);
        assert_eq!(draft.ingredients, vec![IngredientAmount { id: 5, amount: 10 }]);
        assert_eq!(
            draft.image,
            Some(ImageSource::Upload {
                content_type: Some(String::from("image/png")),
                filename: Some(String::from("soup.png")),
                bytes: b"hello".to_vec(),
            })
        );
    }

    #[tokio::test]
    async fn multipart_accepts_inline_image_and_rejects_bad_lists() {
        let body = [
            text_part("name", "Tea"),
            text_part("text", "Steep"),
            text_part("cooking_time", "5"),
            text_part("tags", "1"),
            text_part("ingredients", r#"[{"id": 5, "amount": 1}]"#),
            text_part("image", "data:image/png;base64,aGVsbG8="),
            format!("--{BOUNDARY}--\r\n"),
        ]
        .concat();
        let draft = read_multipart(multipart(body).await).await.unwrap();
        assert_eq!(
            draft.image,
            Some(ImageSource::DataUri(String::from(
                "data:image/png;base64,aGVsbG8="
            )))
        );

        let body = [
            text_part("name", "Tea"),
            text_part("ingredients", "5:1"),
            format!("--{BOUNDARY}--\r\n"),
        ]
        .concat();
        assert_eq!(
            read_multipart(multipart(body).await)
                .await
                .unwrap_err()
                .to_string(),
            "Field `ingredients` must be a JSON list"
        );
    }
}
