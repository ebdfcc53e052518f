mod common;

use common::{context, draft, Kitchen};
use foodgram_sdk::{
    actions::{
        recipes::create_recipe,
        subscriptions::{list_subscriptions, subscribe, unsubscribe},
        users::get_user_view,
    },
    context::RequestContext,
    pagination::PageQuery,
    store::RecipeStore,
    RecipeError,
};

#[tokio::test]
async fn self_follow_always_fails() {
    let kitchen = Kitchen::new().await;
    let ctx = context(&kitchen.cook);

    for _ in 0..2 {
        assert_eq!(
            subscribe(&*kitchen.store, &ctx, kitchen.cook.id, None)
                .await
                .unwrap_err(),
            RecipeError::SelfFollow
        );
    }
    assert!(!kitchen
        .store
        .is_following(kitchen.cook.id, kitchen.cook.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn subscribe_once_then_duplicate() {
    let kitchen = Kitchen::new().await;
    let ctx = context(&kitchen.guest);
    create_recipe(
        &*kitchen.store,
        &kitchen.media,
        &context(&kitchen.cook),
        draft("Soup", &[&kitchen.lunch], &[(&kitchen.salt, 1)]),
    )
    .await
    .unwrap();

    let view = subscribe(&*kitchen.store, &ctx, kitchen.cook.id, None)
        .await
        .unwrap();
    assert_eq!(view.user.id, kitchen.cook.id);
    assert!(view.user.is_subscribed);
    assert_eq!(view.recipes_count, 1);
    assert_eq!(view.recipes.len(), 1);

    assert_eq!(
        subscribe(&*kitchen.store, &ctx, kitchen.cook.id, None)
            .await
            .unwrap_err(),
        RecipeError::DuplicateFollow
    );
    assert_eq!(
        subscribe(&*kitchen.store, &ctx, 999, None).await.unwrap_err(),
        RecipeError::not_found("User", 999)
    );
}

#[tokio::test]
async fn unsubscribe_is_silent_when_absent() {
    let kitchen = Kitchen::new().await;
    let ctx = context(&kitchen.guest);

    unsubscribe(&*kitchen.store, &ctx, kitchen.cook.id)
        .await
        .unwrap();

    subscribe(&*kitchen.store, &ctx, kitchen.cook.id, None)
        .await
        .unwrap();
    unsubscribe(&*kitchen.store, &ctx, kitchen.cook.id)
        .await
        .unwrap();

    let view = get_user_view(&*kitchen.store, &ctx, kitchen.cook.id)
        .await
        .unwrap();
    assert!(!view.is_subscribed);

    assert_eq!(
        unsubscribe(&*kitchen.store, &ctx, 999).await.unwrap_err(),
        RecipeError::not_found("User", 999)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribes_leave_one_row() {
    let kitchen = Kitchen::new().await;
    let author = kitchen.cook.id;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = kitchen.store.clone();
            let ctx = context(&kitchen.guest);
            tokio::spawn(async move { subscribe(&*store, &ctx, author, None).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e, RecipeError::DuplicateFollow),
        }
    }
    assert_eq!(created, 1);

    let (authors, total) = kitchen
        .store
        .list_following(kitchen.guest.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(authors[0].id, author);
}

#[tokio::test]
async fn lists_subscriptions_with_recipe_previews() {
    let kitchen = Kitchen::new().await;
    let cook = context(&kitchen.cook);
    for name in ["Soup", "Bread", "Pie"] {
        create_recipe(
            &*kitchen.store,
            &kitchen.media,
            &cook,
            draft(name, &[&kitchen.lunch], &[(&kitchen.flour, 1)]),
        )
        .await
        .unwrap();
    }

    let ctx = context(&kitchen.guest);
    subscribe(&*kitchen.store, &ctx, kitchen.cook.id, None)
        .await
        .unwrap();
    subscribe(&*kitchen.store, &ctx, kitchen.admin.id, None)
        .await
        .unwrap();

    let page = list_subscriptions(&*kitchen.store, &ctx, &PageQuery::default(), Some(2))
        .await
        .unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.results[0].user.id, kitchen.cook.id);
    assert_eq!(page.results[0].recipes_count, 3);
    let names: Vec<&str> = page.results[0]
        .recipes
        .iter()
        .map(|recipe| recipe.name.as_str())
        .collect();
    assert_eq!(names, vec!["Pie", "Bread"]);
    assert_eq!(page.results[1].recipes_count, 0);

    assert!(matches!(
        list_subscriptions(&*kitchen.store, &ctx, &PageQuery::default(), Some(-1)).await,
        Err(RecipeError::InvalidInput(_))
    ));
    assert_eq!(
        list_subscriptions(
            &*kitchen.store,
            &RequestContext::anonymous(),
            &PageQuery::default(),
            None
        )
        .await
        .unwrap_err(),
        RecipeError::Unauthenticated
    );
}
