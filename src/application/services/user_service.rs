//! User Service
//!
//! User search and profile updates. Search results carry live presence.
//! Profile pictures live in their own [`Storage`], separate from attachments.

use std::sync::Arc;

use async_trait::async_trait;

use super::UploadDto;
use crate::application::dto::response::UserResponse;
use crate::domain::UserRepository;
use crate::infrastructure::storage::Storage;
use crate::presentation::websocket::PresenceRegistry;
use crate::shared::error::AppError;

/// Upper bound for a profile picture upload.
pub const MAX_PICTURE_BYTES: usize = 10 * 1024 * 1024;

const PICTURE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// Content type to serve a stored picture with, from its extension.
pub fn picture_content_type(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    /// Search by username or phone, annotated with `isOnline`
    async fn search(&self, query: &str) -> Result<Vec<UserResponse>, UserError>;

    async fn update_personal_info(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: Option<String>,
    ) -> Result<UserResponse, UserError>;

    /// Replace the caller's profile picture. The previous file is removed.
    async fn update_profile_picture(
        &self,
        user_id: i64,
        upload: UploadDto,
    ) -> Result<UserResponse, UserError>;

    async fn delete_profile_picture(&self, user_id: i64) -> Result<(), UserError>;

    /// Bytes of a stored profile picture.
    async fn profile_picture(&self, file_name: &str) -> Result<Vec<u8>, UserError>;
}

/// User errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Search query is required")]
    EmptyQuery,

    #[error("Users not found")]
    NoMatches,

    #[error("User not found")]
    NotFound,

    #[error("Picture is required")]
    MissingPicture,

    #[error("Picture must be image/jpeg or image/png")]
    UnsupportedPicture,

    #[error("Picture must not exceed 10 MB")]
    PictureTooLarge,

    #[error("Picture not found")]
    PictureNotFound,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmptyQuery => AppError::field("query", "is required"),
            UserError::MissingPicture => AppError::field("picture", "is required"),
            UserError::UnsupportedPicture => {
                AppError::field("picture", "must be image/jpeg or image/png")
            }
            UserError::PictureTooLarge => AppError::field("picture", "must not exceed 10 MB"),
            UserError::NoMatches | UserError::NotFound | UserError::PictureNotFound => {
                AppError::NotFound(err.to_string())
            }
            UserError::Store(e) => e,
        }
    }
}

/// UserService implementation
pub struct UserServiceImpl<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    registry: Arc<PresenceRegistry>,
    pictures: Arc<dyn Storage>,
}

impl<U> UserServiceImpl<U>
where
    U: UserRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        registry: Arc<PresenceRegistry>,
        pictures: Arc<dyn Storage>,
    ) -> Self {
        Self {
            user_repo,
            registry,
            pictures,
        }
    }
}

fn check_picture(upload: &UploadDto) -> Result<(), UserError> {
    if upload.bytes.is_empty() {
        return Err(UserError::MissingPicture);
    }
    if !PICTURE_TYPES.contains(&upload.content_type.as_str()) {
        return Err(UserError::UnsupportedPicture);
    }
    if upload.bytes.len() > MAX_PICTURE_BYTES {
        return Err(UserError::PictureTooLarge);
    }
    Ok(())
}

#[async_trait]
impl<U> UserService for UserServiceImpl<U>
where
    U: UserRepository + 'static,
{
    async fn search(&self, query: &str) -> Result<Vec<UserResponse>, UserError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(UserError::EmptyQuery);
        }

        let users = self.user_repo.search(query).await?;
        if users.is_empty() {
            return Err(UserError::NoMatches);
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let online = self.registry.is_online(user.id);
                UserResponse::from(user).with_online(online)
            })
            .collect())
    }

    #[tracing::instrument(skip(self, last_name))]
    async fn update_personal_info(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: Option<String>,
    ) -> Result<UserResponse, UserError> {
        if self.user_repo.find_by_id(user_id).await?.is_none() {
            return Err(UserError::NotFound);
        }

        let user = self
            .user_repo
            .update_personal_info(user_id, first_name, last_name)
            .await?;

        Ok(user.into())
    }

    #[tracing::instrument(skip(self, upload), fields(size = upload.bytes.len()))]
    async fn update_profile_picture(
        &self,
        user_id: i64,
        upload: UploadDto,
    ) -> Result<UserResponse, UserError> {
        check_picture(&upload)?;

        let previous = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?
            .profile_picture;

        let stored = self.pictures.save(&upload.file_name, &upload.bytes).await?;
        let user = self
            .user_repo
            .update_profile_picture(user_id, Some(stored.file_path))
            .await?;

        if let Some(old) = previous {
            if let Err(e) = self.pictures.delete(&old).await {
                tracing::warn!(user_id, file = %old, error = %e, "Failed to delete old profile picture");
            }
        }

        Ok(user.into())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_profile_picture(&self, user_id: i64) -> Result<(), UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        if let Some(picture) = &user.profile_picture {
            self.pictures.delete(picture).await?;
        }

        self.user_repo.update_profile_picture(user_id, None).await?;
        Ok(())
    }

    async fn profile_picture(&self, file_name: &str) -> Result<Vec<u8>, UserError> {
        self.pictures
            .read(file_name)
            .await?
            .ok_or(UserError::PictureNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockUserRepository, User};
    use crate::infrastructure::storage::{MockStorage, StoredFile};
    use crate::presentation::websocket::ConnectionHandle;

    fn pictures() -> Arc<dyn Storage> {
        Arc::new(MockStorage::new())
    }

    fn service(users: MockUserRepository) -> UserServiceImpl<MockUserRepository> {
        UserServiceImpl::new(Arc::new(users), Arc::new(PresenceRegistry::new()), pictures())
    }

    fn with_pictures(
        users: MockUserRepository,
        storage: MockStorage,
    ) -> UserServiceImpl<MockUserRepository> {
        UserServiceImpl::new(
            Arc::new(users),
            Arc::new(PresenceRegistry::new()),
            Arc::new(storage),
        )
    }

    fn png(bytes: usize) -> UploadDto {
        UploadDto {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            bytes: vec![7; bytes],
        }
    }

    fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.into(),
            ..User::default()
        }
    }

    #[tokio::test]
    async fn test_search_annotates_presence() {
        let registry = Arc::new(PresenceRegistry::new());
        let (handle, _outbox) = ConnectionHandle::new(8);
        registry.register(2, handle);

        let mut users = MockUserRepository::new();
        users
            .expect_search()
            .withf(|q| q == "ali")
            .returning(|_| Ok(vec![user(1, "alice"), user(2, "alina")]));

        let results = UserServiceImpl::new(Arc::new(users), registry, pictures())
            .search("  ali ")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].is_online, Some(false));
        assert_eq!(results[1].is_online, Some(true));
    }

    #[tokio::test]
    async fn test_search_without_matches() {
        let mut users = MockUserRepository::new();
        users.expect_search().returning(|_| Ok(vec![]));

        let result = service(users)
            .search("nobody")
            .await;

        assert!(matches!(result, Err(UserError::NoMatches)));
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let result = UserServiceImpl::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(PresenceRegistry::new()),
            pictures(),
        )
        .search("   ")
        .await;

        assert!(matches!(
            result.map_err(AppError::from),
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_personal_info() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(user(id, "alice"))));
        users
            .expect_update_personal_info()
            .withf(|id, first, last| *id == 1 && first == "Alice" && last.as_deref() == Some("Smith"))
            .returning(|id, first, last| {
                Ok(User {
                    first_name: Some(first.to_string()),
                    last_name: last,
                    ..user(id, "alice")
                })
            });

        let updated = service(users)
            .update_personal_info(1, "Alice", Some("Smith".into()))
            .await
            .unwrap();

        assert_eq!(updated.first_name.as_deref(), Some("Alice"));
        assert_eq!(updated.last_name.as_deref(), Some("Smith"));
    }

    // ========================================================================
    // Profile picture
    // ========================================================================

    #[test]
    fn test_picture_content_type() {
        assert_eq!(picture_content_type("a.PNG"), "image/png");
        assert_eq!(picture_content_type("a.jpg"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_update_picture_replaces_previous_file() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                profile_picture: Some("old.png".into()),
                ..user(id, "alice")
            }))
        });
        users
            .expect_update_profile_picture()
            .withf(|id, picture| *id == 1 && picture.as_deref() == Some("new.png"))
            .times(1)
            .returning(|id, picture| {
                Ok(User {
                    profile_picture: picture,
                    ..user(id, "alice")
                })
            });

        let mut storage = MockStorage::new();
        storage
            .expect_save()
            .withf(|name, bytes| name == "me.png" && bytes.len() == 4)
            .times(1)
            .returning(|_, bytes| {
                Ok(StoredFile {
                    file_path: "new.png".into(),
                    file_size: bytes.len() as i64,
                })
            });
        storage
            .expect_delete()
            .withf(|path| path == "old.png")
            .times(1)
            .returning(|_| Ok(()));

        let updated = with_pictures(users, storage)
            .update_profile_picture(1, png(4))
            .await
            .unwrap();

        assert_eq!(updated.profile_picture.as_deref(), Some("new.png"));
    }

    #[tokio::test]
    async fn test_update_picture_survives_failed_cleanup() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                profile_picture: Some("old.png".into()),
                ..user(id, "alice")
            }))
        });
        users
            .expect_update_profile_picture()
            .returning(|id, picture| {
                Ok(User {
                    profile_picture: picture,
                    ..user(id, "alice")
                })
            });

        let mut storage = MockStorage::new();
        storage.expect_save().returning(|_, _| {
            Ok(StoredFile {
                file_path: "new.png".into(),
                file_size: 1,
            })
        });
        storage
            .expect_delete()
            .returning(|_| Err(AppError::Internal("disk".into())));

        let result = with_pictures(users, storage)
            .update_profile_picture(1, png(1))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_update_picture_rejects_other_types() {
        let mut storage = MockStorage::new();
        storage.expect_save().never();

        let upload = UploadDto {
            content_type: "image/gif".into(),
            ..png(4)
        };
        let result = with_pictures(MockUserRepository::new(), storage)
            .update_profile_picture(1, upload)
            .await;

        assert!(matches!(result, Err(UserError::UnsupportedPicture)));
        assert!(matches!(
            AppError::from(UserError::UnsupportedPicture),
            AppError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_update_picture_rejects_oversized_and_empty() {
        let service = with_pictures(MockUserRepository::new(), MockStorage::new());

        let too_big = service
            .update_profile_picture(1, png(MAX_PICTURE_BYTES + 1))
            .await;
        assert!(matches!(too_big, Err(UserError::PictureTooLarge)));

        let empty = service.update_profile_picture(1, png(0)).await;
        assert!(matches!(empty, Err(UserError::MissingPicture)));
    }

    #[tokio::test]
    async fn test_delete_picture_clears_column() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                profile_picture: Some("old.png".into()),
                ..user(id, "alice")
            }))
        });
        users
            .expect_update_profile_picture()
            .withf(|id, picture| *id == 3 && picture.is_none())
            .times(1)
            .returning(|id, _| Ok(user(id, "alice")));

        let mut storage = MockStorage::new();
        storage
            .expect_delete()
            .withf(|path| path == "old.png")
            .times(1)
            .returning(|_| Ok(()));

        with_pictures(users, storage)
            .delete_profile_picture(3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_picture_without_one() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(user(id, "alice"))));
        users
            .expect_update_profile_picture()
            .times(1)
            .returning(|id, _| Ok(user(id, "alice")));

        let mut storage = MockStorage::new();
        storage.expect_delete().never();

        with_pictures(users, storage)
            .delete_profile_picture(3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_picture_is_not_found() {
        let mut storage = MockStorage::new();
        storage.expect_read().returning(|_| Ok(None));

        let result = with_pictures(MockUserRepository::new(), storage)
            .profile_picture("gone.png")
            .await;

        assert!(matches!(result, Err(UserError::PictureNotFound)));
    }
}
