//! Konsolen-Darstellung von Chat-Ereignissen

use hubcrypt_core::ChatEvent;

/// Formatiert ein Ereignis als eine Zeile fuer die Konsole
///
/// Unverschluesselte Nachrichten sind immer sichtbar markiert.
pub fn zeile(event: &ChatEvent) -> String {
    let text = match event {
        ChatEvent::Entschluesselt {
            from,
            text,
            empfangen,
        } => format!("[{}] {}: {}", empfangen.format("%H:%M:%S"), from, text),
        ChatEvent::Klartext {
            user,
            text,
            zeitstempel,
        } => match zeitstempel {
            Some(zeit) => format!("[UNVERSCHLUESSELT {}] {}: {}", zeit, user, text),
            None => format!("[UNVERSCHLUESSELT] {}: {}", user, text),
        },
        ChatEvent::OhneSchluessel { from } => {
            format!("Nachricht von {} nicht lesbar (noch kein Schluessel)", from)
        }
        ChatEvent::SchluesselEtabliert { peer } => {
            format!("Sichere Verbindung mit {} hergestellt", peer)
        }
        ChatEvent::VerbindungGeschlossen { grund: Some(grund) } => {
            format!("Verbindung beendet: {}", grund)
        }
        ChatEvent::VerbindungGeschlossen { grund: None } => "Verbindung beendet".to_string(),
    };

    // Kontroll-Ereignisse mit Stern, Chat-Texte ohne
    if event.ist_anzeigbar() {
        text
    } else {
        format!("* {}", text)
    }
}
