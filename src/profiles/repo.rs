use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub birthdate: Option<Date>,
    pub website: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileRepoError {
    #[error("user not found")]
    UserNotFound,
    #[error("profile already exists")]
    AlreadyExists,
    #[error("profile not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

fn classify_insert(e: sqlx::Error) -> ProfileRepoError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some(PG_UNIQUE_VIOLATION) => return ProfileRepoError::AlreadyExists,
            Some(PG_FOREIGN_KEY_VIOLATION) => return ProfileRepoError::UserNotFound,
            _ => {}
        }
    }
    ProfileRepoError::Db(e)
}

#[derive(Debug, Default)]
pub struct NewProfile {
    pub bio: Option<String>,
    pub location: Option<String>,
    pub birthdate: Option<Date>,
    pub website: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProfilePatch {
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub birthdate: Option<Option<Date>>,
    pub website: Option<Option<String>>,
}

impl Profile {
    pub async fn get_by_user_id(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Profile>, ProfileRepoError> {
        let profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(db)
                .await?;
        Ok(profile)
    }

    /// One profile per user; the unique index on `user_id` turns a second
    /// insert into `AlreadyExists`, and the FK turns an unknown user into
    /// `UserNotFound`.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        new: NewProfile,
    ) -> Result<Profile, ProfileRepoError> {
        sqlx::query_as::<_, Profile>(
            "INSERT INTO user_profiles (user_id, bio, location, birthdate, website)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(new.bio)
        .bind(new.location)
        .bind(new.birthdate)
        .bind(new.website)
        .fetch_one(db)
        .await
        .map_err(classify_insert)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<Profile, ProfileRepoError> {
        let current = Self::get_by_user_id(db, user_id)
            .await?
            .ok_or(ProfileRepoError::NotFound)?;

        let bio = patch.bio.unwrap_or(current.bio);
        let location = patch.location.unwrap_or(current.location);
        let birthdate = patch.birthdate.unwrap_or(current.birthdate);
        let website = patch.website.unwrap_or(current.website);

        let profile = sqlx::query_as::<_, Profile>(
            "UPDATE user_profiles
             SET bio = $2, location = $3, birthdate = $4, website = $5, updated_at = now()
             WHERE user_id = $1
             RETURNING *",
        )
        .bind(user_id)
        .bind(bio)
        .bind(location)
        .bind(birthdate)
        .bind(website)
        .fetch_one(db)
        .await?;
        Ok(profile)
    }
}
