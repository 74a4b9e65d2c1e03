//! User-facing message copy in both languages.
//!
//! The wording follows the production bot; only the shape of the bilingual
//! branching matters to the state machine, which never embeds copy itself.

use crate::types::{Button, Language, MuscleGroup};

pub fn language_prompt() -> &'static str {
    "🌐 Please choose your language:"
}

pub fn language_buttons() -> Vec<Button> {
    vec![
        Button::new("lang_en", "English"),
        Button::new("lang_es", "Español"),
    ]
}

pub fn welcome_back(lang: Language) -> &'static str {
    match lang {
        Language::En => {
            "You're already registered. Would you like to re-register or continue with workouts?"
        }
        Language::Es => {
            "Ya estás registrado. ¿Deseas volver a registrar o continuar con entrenamientos?"
        }
    }
}

pub fn registration_buttons(lang: Language) -> Vec<Button> {
    match lang {
        Language::En => vec![
            Button::new("re_register", "Re-register"),
            Button::new("continue", "Continue"),
        ],
        Language::Es => vec![
            Button::new("re_register", "Registrar de nuevo"),
            Button::new("continue", "Continuar"),
        ],
    }
}

pub fn name_prompt(lang: Language) -> &'static str {
    match lang {
        Language::En => "📝 What's your name?",
        Language::Es => "📝 ¿Cuál es tu nombre?",
    }
}

pub fn email_prompt(lang: Language) -> &'static str {
    match lang {
        Language::En => "📧 What's your email?",
        Language::Es => "📧 ¿Cuál es tu correo electrónico?",
    }
}

fn muscle_list(lang: Language) -> String {
    MuscleGroup::ALL
        .iter()
        .map(|g| format!("- {}", g.display_name(lang)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn muscle_menu(lang: Language) -> String {
    match lang {
        Language::En => format!(
            "💪 Reply with a muscle group:\n{}\n\n📊 Or type 'tracker' to open your workout tracker",
            muscle_list(lang)
        ),
        Language::Es => format!(
            "💪 Responde con un grupo muscular:\n{}\n\n📊 O escribe 'tracker' para abrir el rastreador",
            muscle_list(lang)
        ),
    }
}

pub fn registered_confirmation(lang: Language) -> String {
    match lang {
        Language::En => format!(
            "✅ You're registered!\n\n💪 Choose a muscle group:\n{}",
            muscle_list(lang)
        ),
        Language::Es => format!(
            "✅ ¡Estás registrado!\n\n💪 Elige un grupo muscular:\n{}",
            muscle_list(lang)
        ),
    }
}

pub fn invalid_muscle(lang: Language) -> String {
    match lang {
        Language::En => format!(
            "❌ Invalid muscle group. Please choose from:\n{}",
            muscle_list(lang)
        ),
        Language::Es => format!(
            "❌ Grupo muscular inválido. Por favor elige de:\n{}",
            muscle_list(lang)
        ),
    }
}

pub fn no_exercises_found(lang: Language, group: MuscleGroup) -> String {
    match lang {
        Language::En => format!(
            "No exercises found for {}. Try another muscle group.",
            group.display_name(lang)
        ),
        Language::Es => format!(
            "No se encontraron ejercicios para {}. Prueba otro grupo muscular.",
            group.display_name(lang)
        ),
    }
}

pub fn exercise_caption(lang: Language, name: &str, equipment: &str) -> String {
    match lang {
        Language::En => format!("{name}\nEquipment: {equipment}"),
        Language::Es => format!("{name}\nEquipo: {equipment}"),
    }
}

pub fn what_next(lang: Language) -> &'static str {
    match lang {
        Language::En => "Would you like to Start Over or Log Out?",
        Language::Es => "¿Quieres empezar de nuevo o cerrar sesión?",
    }
}

pub fn what_next_buttons(lang: Language) -> Vec<Button> {
    match lang {
        Language::En => vec![
            Button::new("start_over", "Start Over"),
            Button::new("view_web", "Open Tracker"),
            Button::new("log_out", "Log Out"),
        ],
        Language::Es => vec![
            Button::new("start_over", "Empezar de nuevo"),
            Button::new("view_web", "Abrir rastreador"),
            Button::new("log_out", "Cerrar sesión"),
        ],
    }
}

pub fn tracker_link(lang: Language, url: &str) -> String {
    match lang {
        Language::En => format!(
            "🌐 *Access Your Workout Tracker*\n\n{url}\n\n⏰ Link expires in 1 hour\n\n📝 Log workouts, track progress, and view analytics!\n\n💬 Type 'hi' to start a new chat session."
        ),
        Language::Es => format!(
            "🌐 *Accede a Tu Rastreador de Entrenamientos*\n\n{url}\n\n⏰ Enlace expira en 1 hora\n\n📝 ¡Registra entrenamientos, rastrea progreso y ve análisis!\n\n💬 Escribe 'hi' para iniciar una nueva sesión de chat."
        ),
    }
}

pub fn tracker_error(lang: Language) -> &'static str {
    match lang {
        Language::En => "❌ Error generating login link. Please try again.",
        Language::Es => "❌ Error generando enlace. Por favor intenta de nuevo.",
    }
}

pub fn farewell(lang: Language) -> &'static str {
    match lang {
        Language::En => "👋 Have a good one.",
        Language::Es => "👋 ¡Que te vaya bien!",
    }
}

/// Fallback when a collaborator is unreachable or input makes no sense in the
/// current phase. Keeps the conversation alive instead of going silent.
pub fn generic_reprompt(lang: Language) -> &'static str {
    match lang {
        Language::En => "🤔 I didn't catch that. Type 'hi' to start over.",
        Language::Es => "🤔 No entendí eso. Escribe 'hola' para empezar de nuevo.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muscle_menu_lists_all_groups() {
        let menu = muscle_menu(Language::En);
        for group in MuscleGroup::ALL {
            assert!(menu.contains(group.display_name(Language::En)));
        }
        let menu_es = muscle_menu(Language::Es);
        assert!(menu_es.contains("Pecho"));
        assert!(menu_es.contains("Piernas"));
    }

    #[test]
    fn test_tracker_link_embeds_url() {
        let msg = tracker_link(Language::En, "https://fit.example/login/abc");
        assert!(msg.contains("https://fit.example/login/abc"));
        let msg_es = tracker_link(Language::Es, "https://fit.example/login/abc");
        assert!(msg_es.contains("https://fit.example/login/abc"));
    }

    #[test]
    fn test_caption_language() {
        assert_eq!(
            exercise_caption(Language::En, "Push-ups", "Bodyweight"),
            "Push-ups\nEquipment: Bodyweight"
        );
        assert_eq!(
            exercise_caption(Language::Es, "Flexiones", "Bodyweight"),
            "Flexiones\nEquipo: Bodyweight"
        );
    }
}
