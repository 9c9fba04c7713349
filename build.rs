fn main() {
    #[cfg(windows)]
    {
        let mut res = winres::WindowsResource::new();
        res.set("FileDescription", "ForcePurge Directory Removal Tool");
        res.set("ProductName", "ForcePurge");
        res.set("OriginalFilename", "forcepurge.exe");

        // 'asInvoker': elevation is requested at runtime via ShellExecute,
        // not at launch, so read-only dry runs work from a normal prompt.
        res.set_manifest(
            r#"
<assembly xmlns="urn:schemas-microsoft-com:asm.v1" manifestVersion="1.0">
<trustInfo xmlns="urn:schemas-microsoft-com:asm.v3">
    <security>
        <requestedPrivileges>
            <requestedExecutionLevel level="asInvoker" uiAccess="false" />
        </requestedPrivileges>
    </security>
</trustInfo>
</assembly>
"#,
        );
        res.compile().unwrap();
    }
}
