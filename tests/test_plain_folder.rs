use concat_with::concat_line;
use std::{
    fs,
    sync::{Arc, Mutex},
};

use localmail_lib::{
    ErrorKind, Flag, Flags, Folder, FolderEvent, FolderType, Message, OpenMode, Store,
    StoreConfig,
};

const RAW: &str = concat_line!(
    "From: alice@localhost",
    "To: bob@localhost",
    "Subject: Plain message!",
    "",
    "Plain message!",
);

fn setup() -> (tempfile::TempDir, Store, Arc<Mutex<Vec<String>>>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        host_name: Some("localhost".into()),
        ..StoreConfig::new(dir.path())
    };
    let store = Store::connect(&config).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    store
        .add_listener(move |event: &FolderEvent| sink.lock().unwrap().push(describe(event)))
        .unwrap();

    (dir, store, events)
}

fn describe(event: &FolderEvent) -> String {
    match event {
        FolderEvent::FolderCreated(folder) => format!("created {}", folder),
        FolderEvent::FolderDeleted(folder) => format!("deleted {}", folder),
        FolderEvent::FolderRenamed { from, to } => format!("renamed {} to {}", from, to),
        FolderEvent::MessagesAdded { folder, messages } => {
            format!("added {} to {}", messages.len(), folder)
        }
        FolderEvent::MessagesRemoved { folder, messages } => {
            format!("removed {} from {}", messages.len(), folder)
        }
    }
}

fn plain_folder(dir: &tempfile::TempDir, store: &Store, name: &str) -> Folder {
    fs::create_dir_all(dir.path().join(name)).unwrap();
    let folder = store.folder(name).unwrap();
    assert!(!folder.is_maildir());
    folder
}

#[test]
fn test_plain_folder() {
    let (dir, store, events) = setup();
    let folder = plain_folder(&dir, &store, "Archive");

    // check that messages can be appended
    let mut messages = vec![
        Message::new(RAW),
        Message::with_flags(RAW, Flags::from_iter([Flag::Flagged])),
    ];
    let appended = folder.append_messages(&mut messages).unwrap();
    assert_eq!(2, appended.len());
    assert!(appended[0].ptr_eq(&messages[0]));
    assert!(appended[1].ptr_eq(&messages[1]));
    assert_eq!(2, folder.message_count().unwrap());
    assert_eq!(vec!["added 2 to Archive"], *events.lock().unwrap());

    // check that appended messages are stored byte for byte
    let path = messages[0].path().unwrap().to_owned();
    assert!(path.starts_with(dir.path().join("Archive")));
    assert_eq!(RAW.as_bytes(), fs::read(&path).unwrap());
    assert_eq!(RAW.as_bytes(), messages[0].raw());

    // check that appended messages keep their flags and know their
    // folder
    assert!(messages[1].has_flag(&Flag::Flagged));
    assert!(!messages[0].has_flag(&Flag::Flagged));
    assert_eq!(1, messages[0].number());
    assert_eq!(2, messages[1].number());
    assert!(messages[0].folder().unwrap().ptr_eq(&folder));

    // check that cached messages are returned as is
    let message = folder.get_message(2).unwrap().unwrap();
    assert!(message.ptr_eq(&messages[1]));

    // check that the content is parsed
    let content = message.content().unwrap();
    assert_eq!(Some("Plain message!"), content.subject.as_deref());
    assert_eq!(Some("alice@localhost"), content.from.as_deref());
    assert_eq!("Plain message!", content.body.trim_end());

    // check that the file name identifies a message
    let filename = messages[1].filename().unwrap().to_owned();
    assert!(filename.ends_with(".localhost"));
    assert_eq!(Some(2), folder.find_message(&filename).unwrap());

    // check that a deleted message is expunged on close
    folder.open(OpenMode::ReadWrite).unwrap();
    assert!(folder.is_open());
    assert_eq!(Some(OpenMode::ReadWrite), folder.mode());
    messages[0].add_flag(Flag::Deleted);
    folder.close(true).unwrap();
    assert!(!folder.is_open());
    assert!(!path.exists());
    assert!(messages[0].is_expunged());
    assert_eq!(1, folder.message_count().unwrap());
    assert_eq!(Some(1), folder.find_message(&filename).unwrap());
    assert_eq!(
        vec!["added 2 to Archive", "removed 1 from Archive"],
        *events.lock().unwrap()
    );

    // check that a reopened folder reads messages from disk
    folder.open(OpenMode::ReadOnly).unwrap();
    let message = folder.get_message(1).unwrap().unwrap();
    assert!(!message.ptr_eq(&messages[1]));
    assert_eq!(messages[1].filename(), message.filename());
    assert_eq!(RAW.as_bytes(), message.raw());
    folder.close(false).unwrap();
}

#[test]
fn test_plain_folder_expunge() {
    let (dir, store, _) = setup();
    let folder = plain_folder(&dir, &store, "Archive");

    let mut messages: Vec<Message> = (0..3).map(|_| Message::new(RAW)).collect();
    folder.append_messages(&mut messages).unwrap();

    // check that only messages flagged as deleted are removed, and
    // that numbers are compacted
    messages[0].add_flag(Flag::Deleted);
    messages[2].add_flag(Flag::Deleted);
    let removed = folder.expunge().unwrap();
    assert_eq!(2, removed.len());
    assert!(removed[0].ptr_eq(&messages[0]));
    assert!(removed[1].ptr_eq(&messages[2]));
    assert_eq!(1, folder.message_count().unwrap());
    assert_eq!(1, messages[1].number());
    assert!(folder.get_message(1).unwrap().unwrap().ptr_eq(&messages[1]));

    // check that an expunge without deleted message changes nothing
    assert!(folder.expunge().unwrap().is_empty());
    assert_eq!(1, folder.message_count().unwrap());

    // check that a file deleted behind the folder back is tolerated
    messages[1].add_flag(Flag::Deleted);
    fs::remove_file(messages[1].path().unwrap()).unwrap();
    assert_eq!(1, folder.expunge().unwrap().len());
    assert_eq!(0, folder.message_count().unwrap());
}

#[test]
fn test_plain_folder_unreadable_message() {
    let (dir, store, _) = setup();
    let folder = plain_folder(&dir, &store, "Archive");
    fs::write(dir.path().join("Archive").join("1.localhost"), RAW).unwrap();
    fs::write(dir.path().join("Archive").join("2.localhost"), RAW).unwrap();

    // check that the listing stays stable when a file vanishes
    folder.open(OpenMode::ReadWrite).unwrap();
    assert_eq!(2, folder.message_count().unwrap());
    fs::remove_file(dir.path().join("Archive").join("1.localhost")).unwrap();
    assert_eq!(2, folder.message_count().unwrap());
    assert!(folder.get_message(1).unwrap().is_none());
    assert!(folder.get_message(2).unwrap().is_some());
    folder.close(false).unwrap();

    // check that the listing is refreshed once closed
    assert_eq!(1, folder.message_count().unwrap());
}

#[test]
fn test_plain_folder_open_lists_again() {
    let (dir, store, _) = setup();
    let folder = plain_folder(&dir, &store, "Archive");

    // check that a file stored while closed is seen once opened
    assert_eq!(0, folder.message_count().unwrap());
    fs::write(dir.path().join("Archive").join("1.localhost"), RAW).unwrap();
    folder.open(OpenMode::ReadWrite).unwrap();
    assert_eq!(1, folder.message_count().unwrap());
    assert!(folder.get_message(1).unwrap().is_some());
    folder.close(false).unwrap();

    // check that loaded messages keep their handle and get renumbered
    let mut messages = vec![Message::new(RAW)];
    folder.append_messages(&mut messages).unwrap();
    assert_eq!(2, messages[0].number());
    fs::write(dir.path().join("Archive").join("0.other"), RAW).unwrap();
    folder.open(OpenMode::ReadWrite).unwrap();
    assert_eq!(3, folder.message_count().unwrap());
    assert_eq!(3, messages[0].number());
    assert!(folder.get_message(3).unwrap().unwrap().ptr_eq(&messages[0]));

    // check that an expunge after opening removes the renumbered message
    messages[0].add_flag(Flag::Deleted);
    folder.close(true).unwrap();
    assert!(messages[0].is_expunged());
    assert_eq!(2, folder.message_count().unwrap());
}

#[test]
fn test_plain_folder_errors() {
    let (dir, store, _) = setup();
    let folder = plain_folder(&dir, &store, "Archive");
    folder.append_messages(&mut [Message::new(RAW)]).unwrap();

    // check the out of range numbers
    let err = folder.get_message(0).unwrap_err();
    assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
    let err = folder.get_message(2).unwrap_err();
    assert_eq!(ErrorKind::IndexOutOfRange, err.kind());

    // check the open state errors
    assert_eq!(
        ErrorKind::IllegalState,
        folder.close(false).unwrap_err().kind()
    );
    folder.open(OpenMode::ReadOnly).unwrap();
    assert_eq!(
        ErrorKind::IllegalState,
        folder.open(OpenMode::ReadOnly).unwrap_err().kind()
    );

    // check that a read-only folder cannot be modified
    let err = folder.append_messages(&mut [Message::new(RAW)]).unwrap_err();
    assert_eq!(ErrorKind::IllegalState, err.kind());
    let err = folder.expunge().unwrap_err();
    assert_eq!(ErrorKind::IllegalState, err.kind());
    let err = folder.delete(false).unwrap_err();
    assert_eq!(ErrorKind::IllegalState, err.kind());
    folder.close(false).unwrap();

    // check that a vanished folder is reported as not found
    fs::remove_dir_all(dir.path().join("Archive")).unwrap();
    assert!(!folder.exists());
    let err = folder.get_message(1).unwrap_err();
    assert_eq!(ErrorKind::FolderNotFound, err.kind());
    let err = folder.list().unwrap_err();
    assert_eq!(ErrorKind::FolderNotFound, err.kind());
    let err = folder.append_messages(&mut [Message::new(RAW)]).unwrap_err();
    assert_eq!(ErrorKind::FolderNotFound, err.kind());

    // check that a file cannot be turned into a folder
    fs::write(dir.path().join("conflict"), "").unwrap();
    let conflict = store.folder("conflict").unwrap();
    let err = conflict.create(FolderType::HOLDS_MESSAGES).unwrap_err();
    assert_eq!(ErrorKind::Messaging, err.kind());
}

#[test]
fn test_plain_folder_list() {
    let (dir, store, _) = setup();
    let folder = plain_folder(&dir, &store, "Archive");
    plain_folder(&dir, &store, "Archive/2021");
    plain_folder(&dir, &store, "Archive/2022");
    fs::create_dir(dir.path().join("Archive").join(".hidden")).unwrap();
    fs::write(dir.path().join("Archive").join("message"), RAW).unwrap();

    // check that subfolders are listed, hidden ones excepted
    let names: Vec<String> = folder
        .list()
        .unwrap()
        .iter()
        .map(|folder| folder.full_name().to_owned())
        .collect();
    assert_eq!(vec!["Archive/2021", "Archive/2022"], names);

    // check that listed folders are the store handles
    let child = store.folder("Archive/2021").unwrap();
    assert!(folder.list().unwrap()[0].ptr_eq(&child));
    assert!(child.parent().unwrap().unwrap().ptr_eq(&folder));
    assert!(folder.folder("2021").unwrap().ptr_eq(&child));

    // check the caller filter
    let folders = folder
        .list_with(|folder| folder.name().ends_with('2'))
        .unwrap();
    assert_eq!(1, folders.len());
    assert_eq!("2022", folders[0].name());

    // check that a folder created on disk shows up once listed again
    let created = folder.folder("2023").unwrap();
    assert!(created.create(FolderType::HOLDS_MESSAGES).unwrap());
    assert_eq!(3, folder.list().unwrap().len());
}

#[test]
fn test_plain_folder_create_and_delete() {
    let (dir, store, events) = setup();
    let folder = plain_folder(&dir, &store, "Archive");
    let child = plain_folder(&dir, &store, "Archive/2022");
    folder.append_messages(&mut [Message::new(RAW)]).unwrap();
    child.append_messages(&mut [Message::new(RAW)]).unwrap();
    events.lock().unwrap().clear();

    // check that creating an existing folder succeeds silently
    assert!(folder
        .create(FolderType::HOLDS_FOLDERS | FolderType::HOLDS_MESSAGES)
        .unwrap());
    assert!(events.lock().unwrap().is_empty());

    // check that a folder holding subfolders is kept without recurse,
    // but its messages are gone
    assert!(!folder.delete(false).unwrap());
    assert!(folder.exists());
    assert_eq!(0, folder.message_count().unwrap());
    assert_eq!(1, child.message_count().unwrap());

    // check that the recursive delete removes everything
    assert!(folder.delete(true).unwrap());
    assert!(!dir.path().join("Archive").exists());
    assert_eq!(
        vec!["deleted Archive/2022", "deleted Archive"],
        *events.lock().unwrap()
    );

    // check that a deleted folder cannot be deleted again
    let err = folder.delete(true).unwrap_err();
    assert_eq!(ErrorKind::FolderNotFound, err.kind());

    // check that the store forgot the deleted handles
    assert!(!store.folder("Archive").unwrap().ptr_eq(&folder));
}

#[test]
fn test_plain_folder_rename() {
    let (dir, store, events) = setup();
    let folder = plain_folder(&dir, &store, "Archive");
    let mut messages = vec![Message::new(RAW)];
    folder.append_messages(&mut messages).unwrap();
    let filename = messages[0].filename().unwrap().to_owned();
    events.lock().unwrap().clear();

    // check that an open folder cannot be renamed
    let target = store.folder("Old/Archive").unwrap();
    folder.open(OpenMode::ReadOnly).unwrap();
    let err = folder.rename_to(&target).unwrap_err();
    assert_eq!(ErrorKind::IllegalState, err.kind());
    folder.close(false).unwrap();

    // check that an existing target is refused
    let existing = plain_folder(&dir, &store, "Existing");
    let err = folder.rename_to(&existing).unwrap_err();
    assert_eq!(ErrorKind::Messaging, err.kind());

    // check that the folder is found at its new path
    assert!(folder.rename_to(&target).unwrap());
    assert!(!dir.path().join("Archive").exists());
    let renamed = store.folder("Old/Archive").unwrap();
    assert!(!renamed.is_maildir());
    assert_eq!(1, renamed.message_count().unwrap());
    assert_eq!(Some(1), renamed.find_message(&filename).unwrap());
    assert_eq!(
        vec!["renamed Archive to Old/Archive"],
        *events.lock().unwrap()
    );

    // check that the parent lists the renamed folder
    let parent = store.folder("Old").unwrap();
    assert!(parent.list().unwrap()[0].ptr_eq(&renamed));
}
