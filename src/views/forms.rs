//! Typed views of submitted item forms.
//!
//! No field is required: a missing `title` reads as an empty string and a
//! missing `description` as `None`. The `completed` checkbox is only sent by
//! browsers when ticked, with the value `on`.

use crate::background::{CreateTask, UpdateTask};
use crate::http::FormData;
use crate::store::ItemId;

const CHECKBOX_ON: &str = "on";

/// Fields of the create form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateForm {
    pub title: String,
    pub description: Option<String>,
}

impl CreateForm {
    pub fn from_form(form: &FormData) -> Self {
        Self {
            title: form.get("title").unwrap_or_default().to_owned(),
            description: form.get("description").map(str::to_owned),
        }
    }
}

impl From<CreateForm> for CreateTask {
    fn from(form: CreateForm) -> Self {
        Self {
            title: form.title,
            description: form.description,
        }
    }
}

/// Fields of the update form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateForm {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl UpdateForm {
    pub fn from_form(form: &FormData) -> Self {
        Self {
            title: form.get("title").unwrap_or_default().to_owned(),
            description: form.get("description").map(str::to_owned),
            completed: form.get("completed") == Some(CHECKBOX_ON),
        }
    }

    pub fn into_task(self, id: ItemId) -> UpdateTask {
        UpdateTask {
            id,
            title: self.title,
            description: self.description,
            completed: self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_form_reads_fields() {
        let form = CreateForm::from_form(&FormData::parse(b"title=Buy+milk&description="));
        assert_eq!(form.title, "Buy milk");
        assert_eq!(form.description.as_deref(), Some(""));
    }

    #[test]
    fn missing_fields_become_empty() {
        let form = CreateForm::from_form(&FormData::new());
        assert_eq!(form, CreateForm::default());

        let form = UpdateForm::from_form(&FormData::new());
        assert_eq!(form, UpdateForm::default());
    }

    #[test]
    fn checkbox_is_on_only_for_on() {
        let ticked = UpdateForm::from_form(&FormData::parse(b"title=a&completed=on"));
        assert!(ticked.completed);

        for body in [&b"title=a"[..], b"title=a&completed=", b"title=a&completed=true"] {
            assert!(!UpdateForm::from_form(&FormData::parse(body)).completed);
        }
    }

    #[test]
    fn update_form_becomes_task() {
        let form = UpdateForm::from_form(&FormData::parse(b"title=t&description=d&completed=on"));
        let task = form.into_task(ItemId::new(5));
        assert_eq!(
            task,
            UpdateTask {
                id: ItemId::new(5),
                title: "t".to_owned(),
                description: Some("d".to_owned()),
                completed: true,
            }
        );
    }
}
